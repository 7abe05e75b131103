//! Process-wide signal hub. A small pub/sub seam so producers of
//! credit-affecting actions and consumers that render balance stay
//! decoupled: any component can emit, every subscriber sees the signal.

use tokio::sync::broadcast;
use tracing::debug;

/// Signals broadcast across the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Some component consumed or restored credits; ledgers should
    /// re-fetch the authoritative balance.
    CreditsChanged,
}

/// Cloneable handle to the process-wide signal channel. One hub is created
/// at session start and injected into producers and consumers.
#[derive(Debug, Clone)]
pub struct SignalHub {
    tx: broadcast::Sender<Signal>,
}

impl SignalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Emit a signal to every current subscriber. A hub with no
    /// subscribers drops the signal silently.
    pub fn emit(&self, signal: Signal) {
        let delivered = self.tx.send(signal).unwrap_or(0);
        debug!(?signal, delivered, "signal emitted");
    }

    /// Subscribe to signals emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
