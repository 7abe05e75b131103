//! Request/response shapes for the generation endpoints.

use adforge_core::types::{AspectRatio, BrandTone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which generation endpoint a job targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AdCopy,
    AdImage,
    ChatEdit,
}

impl JobKind {
    /// REST path under the API base for this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::AdCopy => "/generation/ad-copy",
            Self::AdImage => "/generation/ad-image",
            Self::ChatEdit => "/generation/chat-edit",
        }
    }

    /// Whether a successful job of this kind consumes a credit.
    pub fn consumes_credit(self) -> bool {
        match self {
            Self::AdCopy => false,
            Self::AdImage | Self::ChatEdit => true,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AdCopy => "ad_copy",
            Self::AdImage => "ad_image",
            Self::ChatEdit => "chat_edit",
        };
        write!(f, "{label}")
    }
}

/// An asynchronous generation request. The correlation id is generated by
/// the client and links the 2xx acknowledgement to the eventual realtime
/// completion event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub correlation_id: Uuid,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_tone: Option<BrandTone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl JobRequest {
    /// Minimal request for the given kind; callers fill in the fields the
    /// endpoint needs.
    pub fn new(kind: JobKind) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            kind,
            product_id: None,
            template_id: None,
            ad_id: None,
            thread_id: None,
            instruction: None,
            brand_tone: None,
            additional_context: None,
            call_to_action: None,
            aspect_ratio: None,
        }
    }
}

/// 2xx acknowledgement that the backend accepted a job for async
/// processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAck {
    pub correlation_id: Uuid,
    pub accepted_at: DateTime<Utc>,
}
