//! Connection seam for the realtime channel.
//!
//! The channel never talks to a socket directly; it asks a [`Transport`]
//! to open a stream of [`ChannelEvent`]s. [`WsTransport`] is the
//! production implementation with its own reconnect/backoff loop;
//! [`ScriptedTransport`] is an in-memory double for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adforge_core::config::RealtimeConfig;
use futures_util::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::events::{parse_frame, ChannelEvent};

/// Opens event streams toward an origin. Implementations own reconnection;
/// the channel only observes the resulting event sequence.
pub trait Transport: Send + Sync {
    /// Start delivering events for `origin` into `tx`. Delivery continues,
    /// across reconnects, until the returned handle is dropped or the
    /// receiver side closes.
    fn open(&self, origin: &str, tx: mpsc::Sender<ChannelEvent>) -> TransportHandle;
}

/// Owner handle for one open transport. Dropping it stops the transport's
/// background work.
pub struct TransportHandle {
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with no background task (used by in-memory transports).
    pub fn detached() -> Self {
        Self { task: None }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

/// Reconnecting WebSocket transport. Connection errors and disconnects are
/// forwarded as events, never surfaced as task failures; reconnect attempts
/// use capped exponential backoff with jitter.
pub struct WsTransport {
    config: RealtimeConfig,
}

impl WsTransport {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    /// `https://` origins map to `wss://`, `http://` to `ws://`.
    fn ws_url(origin: &str) -> String {
        if let Some(rest) = origin.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = origin.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            origin.to_string()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_ms;
        let capped = base
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.config.reconnect_max_ms);
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(capped + jitter)
    }
}

impl Transport for WsTransport {
    fn open(&self, origin: &str, tx: mpsc::Sender<ChannelEvent>) -> TransportHandle {
        let url = Self::ws_url(origin);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let transport = WsTransport { config };
            let mut attempt: u32 = 0;

            loop {
                match connect_async(url.as_str()).await {
                    Ok((mut stream, _)) => {
                        attempt = 0;
                        metrics::counter!("realtime.connections").increment(1);
                        if tx.send(ChannelEvent::Connect).await.is_err() {
                            return;
                        }

                        let mut close_reason = "transport closed".to_string();
                        while let Some(message) = stream.next().await {
                            match message {
                                Ok(Message::Text(text)) => match parse_frame(&text) {
                                    Ok(Some(event)) => {
                                        if tx.send(event).await.is_err() {
                                            return;
                                        }
                                    }
                                    Ok(None) => {
                                        debug!("skipping unconsumed event frame");
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "dropping malformed frame");
                                        metrics::counter!("realtime.malformed_frames")
                                            .increment(1);
                                    }
                                },
                                Ok(Message::Close(frame)) => {
                                    if let Some(frame) = frame {
                                        close_reason = frame.reason.to_string();
                                    }
                                    break;
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    close_reason = e.to_string();
                                    break;
                                }
                            }
                        }

                        if tx
                            .send(ChannelEvent::Disconnect {
                                reason: close_reason,
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        if tx
                            .send(ChannelEvent::ConnectError {
                                message: e.to_string(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }

                let delay = transport.backoff(attempt);
                attempt = attempt.saturating_add(1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
                metrics::counter!("realtime.reconnects").increment(1);
                tokio::time::sleep(delay).await;
            }
        });

        TransportHandle::from_task(task)
    }
}

// ---------------------------------------------------------------------------
// Scripted transport (tests)
// ---------------------------------------------------------------------------

/// In-memory transport that lets tests feed events to the channel and
/// simulate drops. Each `open` records the sender and immediately reports
/// a successful connection.
#[derive(Default)]
pub struct ScriptedTransport {
    senders: Mutex<Vec<mpsc::Sender<ChannelEvent>>>,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the channel opened this transport.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Deliver an event on the most recently opened stream.
    pub async fn emit(&self, event: ChannelEvent) {
        let sender = self
            .senders
            .lock()
            .last()
            .cloned()
            .expect("no open stream to emit on");
        sender.send(event).await.expect("channel receiver gone");
    }

    /// Simulate a transport-level drop followed by a reconnect, the way
    /// the WebSocket transport behaves on network loss.
    pub async fn drop_and_reconnect(&self) {
        self.emit(ChannelEvent::Disconnect {
            reason: "transport error".to_string(),
        })
        .await;
        self.emit(ChannelEvent::Connect).await;
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, _origin: &str, tx: mpsc::Sender<ChannelEvent>) -> TransportHandle {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let _ = tx.try_send(ChannelEvent::Connect);
        self.senders.lock().push(tx);
        TransportHandle::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_scheme_mapping() {
        assert_eq!(
            WsTransport::ws_url("https://api.example.com"),
            "wss://api.example.com"
        );
        assert_eq!(
            WsTransport::ws_url("http://localhost:8080"),
            "ws://localhost:8080"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let transport = WsTransport::new(RealtimeConfig {
            reconnect_base_ms: 100,
            reconnect_max_ms: 2_000,
        });
        let delay = transport.backoff(30);
        // cap + max jitter
        assert!(delay <= Duration::from_millis(2_100));
        assert!(transport.backoff(0) >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_scripted_transport_reports_connect_on_open() {
        let transport = ScriptedTransport::new();
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = transport.open("http://localhost", tx);

        assert_eq!(transport.open_count(), 1);
        assert!(matches!(rx.recv().await, Some(ChannelEvent::Connect)));
    }
}
