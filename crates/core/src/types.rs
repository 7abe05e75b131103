//! Shared domain model for the ad generation and chat-editing engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Catalog entities
// ---------------------------------------------------------------------------

/// The user's advertised item. Owned by the product management flow;
/// the workspace holds a reference, never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub highlights: Vec<String>,
    pub target_audience: String,
    pub image_url: Option<String>,
}

/// A selectable visual layout from the template catalog. Immutable once
/// fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdTemplate {
    pub id: Uuid,
    pub image_url: String,
    pub category: String,
    pub brand: Option<String>,
    pub niche: Option<String>,
    pub sub_niche: Option<String>,
    pub tags: Vec<String>,
    pub is_custom: bool,
}

/// Generated textual content bound to one template. Immutable once created;
/// an edit produces a new AdCopy rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCopy {
    pub template_id: Uuid,
    pub headline: String,
    pub subtitle: String,
    pub body: String,
    pub call_to_action: String,
}

/// Output aspect ratio for a generated ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    Square,
    Portrait,
    Landscape,
    Story,
}

/// Brand voice preset applied to copy generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandTone {
    Professional,
    Playful,
    Bold,
    Minimal,
    Luxury,
    Custom(String),
}

/// An uploaded media file attached to the wizard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Generated ads and chat threads
// ---------------------------------------------------------------------------

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    System,
}

/// One message in an ad's edit thread. Ids are unique within the thread;
/// messages are ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: MessageSender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageSender::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageSender::System, content)
    }

    fn new(sender: MessageSender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An append-only conversation attached to one generated ad.
///
/// Invariants: `updated_at >= created_at`, bumped on every append; messages
/// are never deleted or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: Uuid,
    pub ad_id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn new(ad_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ad_id,
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. The only mutation a thread supports; `updated_at`
    /// never moves backwards even if the message carries an older clock.
    pub fn append(&mut self, message: ChatMessage) {
        self.updated_at = self.updated_at.max(message.timestamp).max(Utc::now());
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// The central mutable artifact: one generated ad with its visual states
/// and edit threads.
///
/// Invariant: exactly one current visual state exists at any time
/// (`final_image_url` if present, else `image_url`). Accepted edits update
/// it atomically with the edit's completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAd {
    pub id: Uuid,
    pub template_id: Uuid,
    pub image_url: String,
    pub final_image_url: Option<String>,
    pub textless_image_url: Option<String>,
    pub copy: AdCopy,
    pub threads: Vec<ChatThread>,
    pub aspect_ratio: AspectRatio,
    pub created_at: DateTime<Utc>,
}

impl GeneratedAd {
    /// The single current visual state.
    pub fn current_image_url(&self) -> &str {
        self.final_image_url.as_deref().unwrap_or(&self.image_url)
    }

    pub fn thread(&self, thread_id: &Uuid) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.id == *thread_id)
    }

    pub fn thread_mut(&mut self, thread_id: &Uuid) -> Option<&mut ChatThread> {
        self.threads.iter_mut().find(|t| t.id == *thread_id)
    }
}

// ---------------------------------------------------------------------------
// Credits and subscription
// ---------------------------------------------------------------------------

/// Trial credit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialStatus {
    #[default]
    NotStarted,
    Active,
    Exhausted,
}

/// Cached view of the user's consumable balance. The backend is the source
/// of truth; this value may be stale between refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub credits: u32,
    pub trial_credits: u32,
    pub trial_status: TrialStatus,
}

impl CreditSummary {
    pub fn has_credits(&self) -> bool {
        self.credits > 0
    }

    pub fn has_trial_credits(&self) -> bool {
        self.trial_credits > 0 && self.trial_status == TrialStatus::Active
    }

    /// True if any balance can fund a generation action.
    pub fn can_generate(&self) -> bool {
        self.has_credits() || self.has_trial_credits()
    }
}

/// Payload of `GET /user/subscription`. Trial fields are optional so a
/// backend without trial support still deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub credits: u32,
    pub is_active: bool,
    pub status: String,
    pub stripe_current_period_end: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub is_cancelled: bool,
    pub stripe_price_id: Option<String>,
    #[serde(default)]
    pub trial_credits: u32,
    #[serde(default)]
    pub trial_status: TrialStatus,
}

impl SubscriptionInfo {
    pub fn credit_summary(&self) -> CreditSummary {
        CreditSummary {
            credits: self.credits,
            trial_credits: self.trial_credits,
            trial_status: self.trial_status,
        }
    }
}

/// One row of `GET /projects/recent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub ad_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable plan. Pricing lookups are a non-critical read; callers
/// treat fetch failures as "no data".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    pub id: Uuid,
    pub name: String,
    pub monthly_price: f64,
    pub included_credits: u32,
}
