//! Realtime event channel — one persistent connection per session to the
//! backend's event stream, with typed named events and handlers that
//! survive reconnects.
//!
//! # Modules
//!
//! - [`events`] — wire frames and the typed [`events::ChannelEvent`] enum
//! - [`transport`] — connection seam: reconnecting WebSocket transport and
//!   a scripted stub for tests
//! - [`channel`] — the [`channel::RealtimeChannel`] handler registry and
//!   dispatcher

pub mod channel;
pub mod events;
pub mod transport;

pub use channel::{ChannelState, HandlerId, RealtimeChannel};
pub use events::{ChannelEvent, JobEvent, JobPayload};
pub use transport::{ScriptedTransport, Transport, TransportHandle, WsTransport};
