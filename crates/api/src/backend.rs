use adforge_core::error::AdForgeResult;
use adforge_core::types::{PricingPlan, ProjectSummary, SubscriptionInfo};
use async_trait::async_trait;

use crate::wire::{JobAck, JobRequest};

/// The REST surface the engine depends on. Implementations: [`crate::HttpBackend`]
/// against the production API, [`crate::StubBackend`] for tests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /user/subscription` — authoritative credit balance and plan state.
    async fn fetch_subscription(&self) -> AdForgeResult<SubscriptionInfo>;

    /// `GET /projects/recent` — most recently touched projects, newest first.
    async fn fetch_recent_projects(&self) -> AdForgeResult<Vec<ProjectSummary>>;

    /// `GET /billing/plans` — optional pricing lookup; callers swallow
    /// failures and treat them as "no data".
    async fn fetch_pricing_plans(&self) -> AdForgeResult<Vec<PricingPlan>>;

    /// POST to the generation endpoint for the request's kind. A returned
    /// ack means the backend accepted the job for async processing; the
    /// result arrives later on the realtime channel.
    async fn submit_job(&self, request: &JobRequest) -> AdForgeResult<JobAck>;
}
