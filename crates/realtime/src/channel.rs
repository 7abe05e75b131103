use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adforge_core::config::realtime_origin;
use adforge_core::error::AdForgeResult;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::ChannelEvent;
use crate::transport::{Transport, TransportHandle};

/// Connection lifecycle as observed by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handle returned by [`RealtimeChannel::on`]; pass back to
/// [`RealtimeChannel::off`] to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

struct Connection {
    origin: String,
    _transport: TransportHandle,
    dispatch: JoinHandle<()>,
}

/// One realtime connection per session, shared by every subscriber.
///
/// The handler registry lives outside the connection, so handlers persist
/// across reconnects and even across explicit disconnect/connect cycles.
/// Connection failures are delivered as `connect_error` events, never
/// raised into callers.
pub struct RealtimeChannel {
    transport: Arc<dyn Transport>,
    handlers: Arc<Mutex<HashMap<String, Vec<(u64, Handler)>>>>,
    state: Arc<Mutex<ChannelState>>,
    connection: Mutex<Option<Connection>>,
    next_handler: AtomicU64,
}

impl RealtimeChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            state: Arc::new(Mutex::new(ChannelState::Disconnected)),
            connection: Mutex::new(None),
            next_handler: AtomicU64::new(0),
        }
    }

    /// Connect to the event stream derived from the REST base URL.
    /// Idempotent: connecting again to the same derived origin is a no-op;
    /// a different origin tears down the old connection first.
    pub fn connect(&self, base_url: &str) -> AdForgeResult<()> {
        let origin = realtime_origin(base_url)?;

        let mut connection = self.connection.lock();
        if let Some(existing) = connection.as_ref() {
            if existing.origin == origin {
                debug!(%origin, "already connected, ignoring connect");
                return Ok(());
            }
            info!(old = %existing.origin, new = %origin, "switching realtime origin");
        }
        // Tear down any previous connection before opening the new one.
        if let Some(old) = connection.take() {
            old.dispatch.abort();
        }

        *self.state.lock() = ChannelState::Connecting;

        let (tx, rx) = mpsc::channel(256);
        let transport_handle = self.transport.open(&origin, tx);
        let dispatch = self.spawn_dispatcher(rx);

        *connection = Some(Connection {
            origin: origin.clone(),
            _transport: transport_handle,
            dispatch,
        });
        info!(%origin, "realtime channel connecting");
        Ok(())
    }

    /// Register a handler for a named event. Multiple handlers per event
    /// are allowed; delivery order is subscription order.
    pub fn on(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&ChannelEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_handler.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .entry(event_name.into())
            .or_default()
            .push((id, Arc::new(handler)));
        HandlerId(id)
    }

    /// Remove a previously registered handler. Unknown ids are ignored.
    pub fn off(&self, event_name: &str, id: HandlerId) {
        if let Some(list) = self.handlers.lock().get_mut(event_name) {
            list.retain(|(hid, _)| *hid != id.0);
        }
    }

    /// Tear down the transport. Handlers stay registered; a later
    /// `connect` resumes delivery to them. Safe when already disconnected.
    pub fn disconnect(&self) {
        if let Some(connection) = self.connection.lock().take() {
            connection.dispatch.abort();
            info!(origin = %connection.origin, "realtime channel disconnected");
        }
        *self.state.lock() = ChannelState::Disconnected;
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    fn spawn_dispatcher(&self, mut rx: mpsc::Receiver<ChannelEvent>) -> JoinHandle<()> {
        let handlers = Arc::clone(&self.handlers);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match &event {
                    ChannelEvent::Connect => *state.lock() = ChannelState::Connected,
                    ChannelEvent::Disconnect { reason } => {
                        debug!(reason, "transport dropped");
                        *state.lock() = ChannelState::Disconnected;
                    }
                    ChannelEvent::ConnectError { message } => {
                        debug!(message, "transport connect error");
                    }
                    _ => {}
                }

                let targets: Vec<Handler> = handlers
                    .lock()
                    .get(event.name())
                    .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default();

                metrics::counter!("realtime.events_dispatched", "event" => event.name())
                    .increment(1);
                for handler in targets {
                    handler(&event);
                }
            }
        })
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
