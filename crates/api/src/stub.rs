//! In-memory backend for tests: records submitted jobs and plays back
//! queued responses.

use std::collections::VecDeque;

use adforge_core::error::{AdForgeError, AdForgeResult};
use adforge_core::types::{PricingPlan, ProjectSummary, SubscriptionInfo, TrialStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::backend::Backend;
use crate::wire::{JobAck, JobRequest};

/// Capture-style [`Backend`] double. Submitted requests are recorded for
/// assertions; each call pops the next queued response, falling back to a
/// configurable default.
#[derive(Default)]
pub struct StubBackend {
    subscription: Mutex<SubscriptionState>,
    submit_queue: Mutex<VecDeque<AdForgeResult<JobAck>>>,
    submitted: Mutex<Vec<JobRequest>>,
    recent_projects: Mutex<Vec<ProjectSummary>>,
    pricing_plans: Mutex<Option<Vec<PricingPlan>>>,
}

#[derive(Default)]
struct SubscriptionState {
    queue: VecDeque<AdForgeResult<SubscriptionInfo>>,
    default: Option<SubscriptionInfo>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The subscription returned when no queued response remains.
    pub fn set_subscription(&self, credits: u32) {
        self.subscription.lock().default = Some(subscription_with(credits));
    }

    /// Queue a one-shot subscription response ahead of the default.
    pub fn push_subscription_response(&self, response: AdForgeResult<SubscriptionInfo>) {
        self.subscription.lock().queue.push_back(response);
    }

    /// Queue a one-shot job-submission response. With an empty queue every
    /// submission is accepted.
    pub fn push_submit_response(&self, response: AdForgeResult<JobAck>) {
        self.submit_queue.lock().push_back(response);
    }

    pub fn set_recent_projects(&self, projects: Vec<ProjectSummary>) {
        *self.recent_projects.lock() = projects;
    }

    pub fn set_pricing_plans(&self, plans: Option<Vec<PricingPlan>>) {
        *self.pricing_plans.lock() = plans;
    }

    /// Every job request submitted so far, in order.
    pub fn submitted_jobs(&self) -> Vec<JobRequest> {
        self.submitted.lock().clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn fetch_subscription(&self) -> AdForgeResult<SubscriptionInfo> {
        let mut state = self.subscription.lock();
        if let Some(queued) = state.queue.pop_front() {
            return queued;
        }
        state
            .default
            .clone()
            .ok_or_else(|| AdForgeError::Fetch("no subscription configured".to_string()))
    }

    async fn fetch_recent_projects(&self) -> AdForgeResult<Vec<ProjectSummary>> {
        Ok(self.recent_projects.lock().clone())
    }

    async fn fetch_pricing_plans(&self) -> AdForgeResult<Vec<PricingPlan>> {
        self.pricing_plans
            .lock()
            .clone()
            .ok_or_else(|| AdForgeError::Fetch("pricing unavailable".to_string()))
    }

    async fn submit_job(&self, request: &JobRequest) -> AdForgeResult<JobAck> {
        self.submitted.lock().push(request.clone());
        if let Some(queued) = self.submit_queue.lock().pop_front() {
            return queued;
        }
        Ok(JobAck {
            correlation_id: request.correlation_id,
            accepted_at: Utc::now(),
        })
    }
}

fn subscription_with(credits: u32) -> SubscriptionInfo {
    SubscriptionInfo {
        credits,
        is_active: true,
        status: "active".to_string(),
        stripe_current_period_end: None,
        stripe_customer_id: None,
        is_cancelled: false,
        stripe_price_id: None,
        trial_credits: 0,
        trial_status: TrialStatus::NotStarted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::JobKind;

    #[tokio::test]
    async fn test_records_submissions_and_acks_by_default() {
        let stub = StubBackend::new();
        let request = JobRequest::new(JobKind::AdImage);

        let ack = stub.submit_job(&request).await.unwrap();
        assert_eq!(ack.correlation_id, request.correlation_id);
        assert_eq!(stub.submitted_count(), 1);
        assert_eq!(stub.submitted_jobs()[0].kind, JobKind::AdImage);
    }

    #[tokio::test]
    async fn test_queued_responses_take_priority() {
        let stub = StubBackend::new();
        stub.set_subscription(5);
        stub.push_subscription_response(Err(AdForgeError::Fetch("down".into())));

        assert!(stub.fetch_subscription().await.is_err());
        assert_eq!(stub.fetch_subscription().await.unwrap().credits, 5);
    }

    #[tokio::test]
    async fn test_pricing_lookup_can_fail() {
        let stub = StubBackend::new();
        assert!(stub.fetch_pricing_plans().await.is_err());

        stub.set_pricing_plans(Some(Vec::new()));
        assert!(stub.fetch_pricing_plans().await.unwrap().is_empty());
    }
}
