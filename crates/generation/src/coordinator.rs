//! Orchestrates asynchronous generation against the backend and merges
//! realtime completion events into the workspace and credit ledger.

use std::sync::Arc;

use adforge_api::wire::{JobKind, JobRequest};
use adforge_api::Backend;
use adforge_core::config::GenerationConfig;
use adforge_core::error::{AdForgeError, AdForgeResult, FailureKind};
use adforge_core::types::{
    AdCopy, AdTemplate, AspectRatio, ChatMessage, PricingPlan, ProjectSummary,
};
use adforge_credits::CreditLedger;
use adforge_realtime::channel::{HandlerId, RealtimeChannel};
use adforge_realtime::events::{
    ChannelEvent, JobPayload, EVENT_GENERATION_COMPLETED, EVENT_GENERATION_FAILED,
};
use adforge_workspace::{AdWorkspace, AppliedEdit};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jobs::{Enqueued, EventOutcome, JobRecord, JobTracker, ReadyJob};

/// Turns user intents into backend-accepted jobs and applies their results.
///
/// One coordinator per session. All event application runs on the realtime
/// channel's dispatch task, so workspace merges happen one at a time; the
/// per-ad ordering contract lives in [`JobTracker`].
#[derive(Clone)]
pub struct GenerationCoordinator {
    backend: Arc<dyn Backend>,
    ledger: Arc<CreditLedger>,
    workspace: AdWorkspace,
    jobs: Arc<JobTracker>,
    config: GenerationConfig,
}

impl GenerationCoordinator {
    pub fn new(
        backend: Arc<dyn Backend>,
        ledger: Arc<CreditLedger>,
        workspace: AdWorkspace,
        config: GenerationConfig,
    ) -> Self {
        Self {
            backend,
            ledger,
            workspace,
            jobs: Arc::new(JobTracker::new()),
            config,
        }
    }

    pub fn workspace(&self) -> &AdWorkspace {
        &self.workspace
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    pub fn job(&self, correlation_id: &Uuid) -> Option<JobRecord> {
        self.jobs.job(correlation_id)
    }

    // ─── Intents ────────────────────────────────────────────────────────

    /// Generate ad copy for one selected template, from the wizard's
    /// product, tone, and context.
    pub async fn generate_ad_copy(&self, template: &AdTemplate) -> AdForgeResult<JobRecord> {
        let data = self.workspace.snapshot();
        let mut request = JobRequest::new(JobKind::AdCopy);
        request.product_id = data.product.as_ref().map(|p| p.id);
        request.template_id = Some(template.id);
        request.brand_tone = data.brand_tone.clone();
        request.additional_context = data.additional_context.clone();
        request.call_to_action = data.call_to_action.clone();

        self.issue(request, None, None).await
    }

    /// Render a full ad image for generated copy. Consumes a credit.
    pub async fn generate_ad_image(
        &self,
        copy: &AdCopy,
        aspect_ratio: AspectRatio,
    ) -> AdForgeResult<JobRecord> {
        self.ensure_credits()?;

        let data = self.workspace.snapshot();
        let mut request = JobRequest::new(JobKind::AdImage);
        request.product_id = data.product.as_ref().map(|p| p.id);
        request.template_id = Some(copy.template_id);
        request.aspect_ratio = Some(aspect_ratio);

        self.issue(request, None, None).await
    }

    /// Apply a chat-driven edit to a resident ad. Consumes a credit. The
    /// job gets the ad's next sequence number so concurrent edits apply
    /// in issue order.
    pub async fn request_edit(
        &self,
        ad_id: &Uuid,
        thread_id: &Uuid,
        instruction: &str,
    ) -> AdForgeResult<JobRecord> {
        if !self.workspace.contains_ad(ad_id) {
            return Err(AdForgeError::NotFound(format!("ad {ad_id}")));
        }
        self.ensure_credits()?;

        let mut request = JobRequest::new(JobKind::ChatEdit);
        request.ad_id = Some(*ad_id);
        request.thread_id = Some(*thread_id);
        request.instruction = Some(instruction.to_string());

        self.issue(request, Some(*ad_id), Some(*thread_id)).await
    }

    /// Optimistic pre-check against the cached balance. The backend stays
    /// authoritative; a stale pass is caught at submission.
    fn ensure_credits(&self) -> AdForgeResult<()> {
        if self.ledger.get().can_generate() {
            Ok(())
        } else {
            Err(AdForgeError::InsufficientCredits(
                "no credits or active trial credits remain".to_string(),
            ))
        }
    }

    async fn issue(
        &self,
        request: JobRequest,
        ad_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    ) -> AdForgeResult<JobRecord> {
        let record = self
            .jobs
            .register(request.correlation_id, request.kind, ad_id, thread_id);
        metrics::counter!("generation.jobs_issued", "kind" => record.kind.to_string())
            .increment(1);

        match self.backend.submit_job(&request).await {
            Ok(ack) => {
                self.jobs.mark_pending(&record.correlation_id);
                info!(
                    correlation_id = %record.correlation_id,
                    kind = %record.kind,
                    accepted_at = %ack.accepted_at,
                    "generation job accepted"
                );
                Ok(self.jobs.job(&record.correlation_id).unwrap_or(record))
            }
            Err(e) => {
                let kind = e.failure_kind();
                warn!(
                    correlation_id = %record.correlation_id,
                    error = %e,
                    "generation job rejected at submission"
                );
                if let Enqueued::Ready(ready) = self.jobs.enqueue(
                    record.correlation_id,
                    EventOutcome::Failed {
                        kind,
                        message: e.to_string(),
                    },
                ) {
                    self.apply_ready(ready);
                }

                if kind == FailureKind::InsufficientCredits {
                    // The cached balance was stale; re-sync from the backend.
                    let _ = self.ledger.refresh().await;
                }
                Err(e)
            }
        }
    }

    // ─── Realtime merge ─────────────────────────────────────────────────

    /// Subscribe this coordinator to the channel's generation events.
    pub fn attach(&self, channel: &RealtimeChannel) -> Vec<HandlerId> {
        let on_completed = {
            let coordinator = self.clone();
            channel.on(EVENT_GENERATION_COMPLETED, move |event| {
                coordinator.handle_channel_event(event)
            })
        };
        let on_failed = {
            let coordinator = self.clone();
            channel.on(EVENT_GENERATION_FAILED, move |event| {
                coordinator.handle_channel_event(event)
            })
        };
        vec![on_completed, on_failed]
    }

    /// Merge one channel event. Duplicates and unknown correlation ids are
    /// dropped; out-of-order edit completions wait in the reorder buffer.
    pub fn handle_channel_event(&self, event: &ChannelEvent) {
        let (correlation_id, outcome) = match event {
            ChannelEvent::JobCompleted(job) => match &job.payload {
                JobPayload::Error { kind, message } => (
                    job.correlation_id,
                    EventOutcome::Failed {
                        kind: *kind,
                        message: message.clone(),
                    },
                ),
                payload => (job.correlation_id, EventOutcome::Completed(payload.clone())),
            },
            ChannelEvent::JobFailed(job) => {
                let (kind, message) = match &job.payload {
                    JobPayload::Error { kind, message } => (*kind, message.clone()),
                    _ => (FailureKind::Fetch, "generation failed".to_string()),
                };
                (job.correlation_id, EventOutcome::Failed { kind, message })
            }
            _ => return,
        };

        match self.jobs.enqueue(correlation_id, outcome) {
            Enqueued::Ready(ready) => self.apply_ready(ready),
            Enqueued::Duplicate => {
                debug!(%correlation_id, "duplicate terminal event ignored");
            }
            Enqueued::Unknown => {
                debug!(%correlation_id, "event for unknown job dropped");
            }
        }
    }

    fn apply_ready(&self, ready: Vec<ReadyJob>) {
        for job in ready {
            match job.outcome {
                EventOutcome::Completed(payload) => {
                    self.apply_completion(&job.record, payload, job.was_orphaned)
                }
                EventOutcome::Failed { kind, ref message } => {
                    self.apply_failure(&job.record, kind, message)
                }
            }
        }
    }

    fn apply_completion(&self, record: &JobRecord, payload: JobPayload, was_orphaned: bool) {
        if was_orphaned && !self.orphan_result_applicable(record) {
            debug!(
                correlation_id = %record.correlation_id,
                "dropping completion for orphaned job"
            );
            metrics::counter!("generation.orphans_dropped").increment(1);
            // The backend still consumed the credit; let sibling surfaces
            // converge on the new balance.
            if record.kind.consumes_credit() {
                self.ledger.notify_changed();
            }
            return;
        }

        match payload {
            JobPayload::AdCopy { copy } => {
                self.workspace.push_ad_copy(copy);
            }
            JobPayload::AdImage { ad } => {
                self.workspace.insert_ad(ad);
            }
            JobPayload::ChatEdit {
                final_image_url,
                textless_image_url,
                summary,
            } => {
                let Some(ad_id) = record.ad_id else {
                    warn!(correlation_id = %record.correlation_id, "edit completion without ad id");
                    return;
                };
                if let Err(e) = self.workspace.apply_edit(
                    &ad_id,
                    record.thread_id.as_ref(),
                    AppliedEdit {
                        final_image_url,
                        textless_image_url,
                        summary,
                    },
                ) {
                    warn!(%ad_id, error = %e, "completed edit could not be applied");
                    return;
                }
            }
            JobPayload::Error { .. } => {
                // Error payloads resolve as failures before reaching here.
                warn!(correlation_id = %record.correlation_id, "error payload in completion path");
                return;
            }
        }

        metrics::counter!("generation.jobs_completed", "kind" => record.kind.to_string())
            .increment(1);
        if record.kind.consumes_credit() {
            self.ledger.notify_changed();
        }
    }

    fn apply_failure(&self, record: &JobRecord, kind: FailureKind, message: &str) {
        metrics::counter!("generation.jobs_failed", "kind" => record.kind.to_string())
            .increment(1);
        warn!(
            correlation_id = %record.correlation_id,
            failure = %kind,
            message,
            "generation job failed"
        );

        // Asynchronous failures surface in the thread; submission-time
        // failures (never acked) surface to the caller instead. The prior
        // state of the affected ad stays untouched either way.
        if record.acked_at.is_some() {
            if let (Some(ad_id), Some(thread_id)) = (record.ad_id, record.thread_id) {
                let _ = self.workspace.append_message(
                    &ad_id,
                    &thread_id,
                    ChatMessage::system(kind.user_message()),
                );
            }
        }

        if kind == FailureKind::InsufficientCredits {
            self.ledger.notify_changed();
        }
    }

    fn orphan_result_applicable(&self, record: &JobRecord) -> bool {
        match record.ad_id {
            Some(ad_id) => self.workspace.contains_ad(&ad_id),
            // Copy and fresh-image results have no resident ad to land on
            // once their wizard context is gone.
            None => false,
        }
    }

    // ─── Cancellation ───────────────────────────────────────────────────

    /// The user navigated away from an ad: its live jobs become orphans.
    /// The backend job is not revocable; late completions are applied
    /// only if the ad is still resident.
    pub fn abandon_ad(&self, ad_id: &Uuid) {
        self.jobs.orphan_ad(ad_id);
    }

    /// The wizard flow was abandoned: every live job becomes an orphan and
    /// the workspace is discarded.
    pub fn abandon_session(&self) {
        info!("session abandoned, orphaning live jobs");
        self.jobs.orphan_all();
        self.workspace.discard();
    }

    // ─── Timeouts ───────────────────────────────────────────────────────

    /// Fail jobs pending longer than the configured threshold. Returns
    /// how many jobs were released (expired plus unblocked successors).
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::seconds(self.config.job_timeout_secs as i64);
        let ready = self.jobs.expire_overdue(timeout, now);
        let released = ready.len();
        self.apply_ready(ready);
        released
    }

    /// Background sweep so no job stays pending forever.
    pub fn spawn_timeout_watchdog(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        let interval = std::time::Duration::from_millis(self.config.watchdog_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                coordinator.expire_overdue(Utc::now());
            }
        })
    }

    // ─── Dashboard reads ────────────────────────────────────────────────

    pub async fn recent_projects(&self) -> AdForgeResult<Vec<ProjectSummary>> {
        self.backend.fetch_recent_projects().await
    }

    /// Optional pricing lookup. Failures are swallowed and read as
    /// "no data" rather than blocking the page.
    pub async fn pricing_plans(&self) -> Option<Vec<PricingPlan>> {
        match self.backend.fetch_pricing_plans().await {
            Ok(plans) => Some(plans),
            Err(e) => {
                debug!(error = %e, "pricing lookup failed, treating as no data");
                None
            }
        }
    }
}
