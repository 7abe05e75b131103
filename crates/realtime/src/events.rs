//! Wire frames and typed events for the realtime channel.
//!
//! Frames are JSON objects of the form `{"event": <name>, "data": {...}}`.
//! Transport lifecycle events (`connect`, `disconnect`, `connect_error`)
//! are emitted by the transport itself; domain events arrive from the
//! backend keyed by the correlation id assigned at request time.

use adforge_core::error::{AdForgeResult, FailureKind};
use adforge_core::types::{AdCopy, GeneratedAd};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_CONNECT: &str = "connect";
pub const EVENT_DISCONNECT: &str = "disconnect";
pub const EVENT_CONNECT_ERROR: &str = "connect_error";
pub const EVENT_GENERATION_COMPLETED: &str = "generation:completed";
pub const EVENT_GENERATION_FAILED: &str = "generation:failed";

/// A domain completion/failure event. `correlation_id` links it back to
/// the request that started the job; `ad_id` is present for jobs bound to
/// an existing ad.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub correlation_id: Uuid,
    pub ad_id: Option<Uuid>,
    pub payload: JobPayload,
}

/// What the backend produced for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobPayload {
    /// Generated ad copy for one template.
    AdCopy { copy: AdCopy },
    /// A freshly generated ad, complete with its initial visual state.
    AdImage { ad: GeneratedAd },
    /// An applied chat edit: the new visual state plus a short summary
    /// for the thread.
    #[serde(rename_all = "camelCase")]
    ChatEdit {
        final_image_url: String,
        textless_image_url: Option<String>,
        summary: String,
    },
    /// Terminal failure reported by the backend.
    Error { kind: FailureKind, message: String },
}

/// Every event a channel subscriber can observe.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connect,
    Disconnect { reason: String },
    ConnectError { message: String },
    JobCompleted(JobEvent),
    JobFailed(JobEvent),
}

impl ChannelEvent {
    /// The name handlers subscribe under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => EVENT_CONNECT,
            Self::Disconnect { .. } => EVENT_DISCONNECT,
            Self::ConnectError { .. } => EVENT_CONNECT_ERROR,
            Self::JobCompleted(_) => EVENT_GENERATION_COMPLETED,
            Self::JobFailed(_) => EVENT_GENERATION_FAILED,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse one incoming text frame. Returns `Ok(None)` for event names this
/// client does not consume; the frame is skipped, not an error.
pub fn parse_frame(text: &str) -> AdForgeResult<Option<ChannelEvent>> {
    let frame: WireFrame = serde_json::from_str(text)?;

    let event = match frame.event.as_str() {
        EVENT_CONNECT => Some(ChannelEvent::Connect),
        EVENT_DISCONNECT => {
            let reason = frame
                .data
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Some(ChannelEvent::Disconnect { reason })
        }
        EVENT_CONNECT_ERROR => {
            let message = frame
                .data
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            Some(ChannelEvent::ConnectError { message })
        }
        EVENT_GENERATION_COMPLETED => {
            Some(ChannelEvent::JobCompleted(serde_json::from_value(frame.data)?))
        }
        EVENT_GENERATION_FAILED => {
            Some(ChannelEvent::JobFailed(serde_json::from_value(frame.data)?))
        }
        _ => None,
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_frame() {
        let correlation_id = Uuid::new_v4();
        let ad_id = Uuid::new_v4();
        let text = format!(
            r#"{{
                "event": "generation:completed",
                "data": {{
                    "correlationId": "{correlation_id}",
                    "adId": "{ad_id}",
                    "payload": {{
                        "type": "chatEdit",
                        "finalImageUrl": "https://cdn.example.com/v2.png",
                        "textlessImageUrl": null,
                        "summary": "Brightened the background"
                    }}
                }}
            }}"#
        );

        let event = parse_frame(&text).unwrap().unwrap();
        match event {
            ChannelEvent::JobCompleted(job) => {
                assert_eq!(job.correlation_id, correlation_id);
                assert_eq!(job.ad_id, Some(ad_id));
                assert!(matches!(job.payload, JobPayload::ChatEdit { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_failed_frame_carries_kind() {
        let correlation_id = Uuid::new_v4();
        let text = format!(
            r#"{{
                "event": "generation:failed",
                "data": {{
                    "correlationId": "{correlation_id}",
                    "adId": null,
                    "payload": {{
                        "type": "error",
                        "kind": "insufficient_credits",
                        "message": "balance exhausted"
                    }}
                }}
            }}"#
        );

        let event = parse_frame(&text).unwrap().unwrap();
        match event {
            ChannelEvent::JobFailed(job) => match job.payload {
                JobPayload::Error { kind, .. } => {
                    assert_eq!(kind, FailureKind::InsufficientCredits)
                }
                other => panic!("unexpected payload: {other:?}"),
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_skipped() {
        let parsed = parse_frame(r#"{"event": "presence:update", "data": {}}"#).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"event": "generation:completed", "data": {"nope": 1}}"#).is_err());
    }

    #[test]
    fn test_disconnect_reason_defaults() {
        let event = parse_frame(r#"{"event": "disconnect"}"#).unwrap().unwrap();
        match event {
            ChannelEvent::Disconnect { reason } => assert_eq!(reason, "unknown"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
