//! Job lifecycle tracking.
//!
//! Every generation request is tracked by its caller-generated correlation
//! id through `Requested → Pending → {Completed | Failed}`, with `Orphaned`
//! for jobs whose originating UI context was abandoned. Chat edits
//! additionally carry a per-ad sequence number assigned at request time;
//! completions are released strictly in issue order through a per-ad
//! reordering buffer, whatever order the network delivers them in.

use std::collections::BTreeMap;

use adforge_api::wire::JobKind;
use adforge_core::error::FailureKind;
use adforge_realtime::events::JobPayload;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// REST call issued, acknowledgement not yet received.
    Requested,
    /// Backend accepted the job for async processing.
    Pending,
    /// Terminal: result applied (or deliberately dropped for an orphan).
    Completed,
    /// Terminal: the job failed with the recorded kind.
    Failed(FailureKind),
    /// The originating UI context was abandoned; kept only for safe
    /// late-arrival handling.
    Orphaned,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// One tracked generation request.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub correlation_id: Uuid,
    pub kind: JobKind,
    pub ad_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
    /// Per-ad issue order, assigned at request time. Chat edits only.
    pub seq: Option<u64>,
    pub state: JobState,
    pub issued_at: DateTime<Utc>,
    pub acked_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// What a realtime event (or the timeout policy) reported for a job.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Completed(JobPayload),
    Failed { kind: FailureKind, message: String },
}

/// A job whose outcome may now be applied: all causally-prior edits for
/// its ad have resolved. The record is already in its terminal state.
#[derive(Debug, Clone)]
pub struct ReadyJob {
    pub record: JobRecord,
    pub outcome: EventOutcome,
    /// The job was orphaned when its outcome arrived; appliers drop the
    /// result unless the affected ad is still resident.
    pub was_orphaned: bool,
}

/// Result of feeding an outcome into the tracker.
#[derive(Debug)]
pub enum Enqueued {
    /// No record for this correlation id; the event is dropped.
    Unknown,
    /// The record already reached a terminal state; the event is a no-op.
    Duplicate,
    /// Jobs now releasable in issue order (possibly empty while earlier
    /// edits for the same ad are still unresolved).
    Ready(Vec<ReadyJob>),
}

#[derive(Default)]
struct AdSequence {
    next_issue: u64,
    next_apply: u64,
    buffered: BTreeMap<u64, (Uuid, EventOutcome)>,
}

/// Correlation-id keyed job store with per-ad edit sequencing.
#[derive(Default)]
pub struct JobTracker {
    jobs: DashMap<Uuid, JobRecord>,
    sequences: DashMap<Uuid, AdSequence>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `Requested` record. Chat edits bound to an ad get the
    /// ad's next sequence number.
    pub fn register(
        &self,
        correlation_id: Uuid,
        kind: JobKind,
        ad_id: Option<Uuid>,
        thread_id: Option<Uuid>,
    ) -> JobRecord {
        let seq = match (kind, ad_id) {
            (JobKind::ChatEdit, Some(ad_id)) => {
                let mut sequence = self.sequences.entry(ad_id).or_default();
                let assigned = sequence.next_issue;
                sequence.next_issue += 1;
                Some(assigned)
            }
            _ => None,
        };

        let record = JobRecord {
            correlation_id,
            kind,
            ad_id,
            thread_id,
            seq,
            state: JobState::Requested,
            issued_at: Utc::now(),
            acked_at: None,
            resolved_at: None,
        };
        self.jobs.insert(correlation_id, record.clone());
        record
    }

    /// The backend acknowledged the job.
    pub fn mark_pending(&self, correlation_id: &Uuid) {
        if let Some(mut record) = self.jobs.get_mut(correlation_id) {
            if record.state == JobState::Requested {
                record.state = JobState::Pending;
                record.acked_at = Some(Utc::now());
            }
        }
    }

    pub fn job(&self, correlation_id: &Uuid) -> Option<JobRecord> {
        self.jobs.get(correlation_id).map(|r| r.clone())
    }

    /// Feed an outcome in. Terminal transitions happen at most once per
    /// correlation id; chat edits release in issue order.
    pub fn enqueue(&self, correlation_id: Uuid, outcome: EventOutcome) -> Enqueued {
        let (seq, ad_id) = {
            let Some(record) = self.jobs.get(&correlation_id) else {
                metrics::counter!("generation.events_unknown").increment(1);
                return Enqueued::Unknown;
            };
            if record.state.is_terminal() {
                metrics::counter!("generation.events_duplicate").increment(1);
                return Enqueued::Duplicate;
            }
            match (record.kind, record.seq, record.ad_id) {
                (JobKind::ChatEdit, Some(seq), Some(ad_id)) => (Some(seq), ad_id),
                _ => (None, Uuid::nil()),
            }
        };

        let Some(seq) = seq else {
            // Not sequence-ordered: resolve immediately.
            let ready = self.resolve(&correlation_id, outcome);
            return Enqueued::Ready(ready.into_iter().collect());
        };

        let mut released = Vec::new();
        let mut sequence = self
            .sequences
            .entry(ad_id)
            .or_default();

        // First outcome for a sequence slot wins; replays wait for the
        // terminal-state check above once the slot resolves.
        sequence.buffered.entry(seq).or_insert((correlation_id, outcome));
        if seq != sequence.next_apply {
            debug!(%correlation_id, seq, next = sequence.next_apply, "buffering out-of-order edit");
            metrics::counter!("generation.events_buffered").increment(1);
        }

        // Drain every consecutively-ready slot.
        loop {
            let front = sequence.buffered.first_key_value().map(|(s, _)| *s);
            if front != Some(sequence.next_apply) {
                break;
            }
            let (_, (ready_id, ready_outcome)) = sequence
                .buffered
                .pop_first()
                .expect("front slot checked above");
            sequence.next_apply += 1;
            released.extend(self.resolve(&ready_id, ready_outcome));
        }

        Enqueued::Ready(released)
    }

    /// Mark every live job for an ad as orphaned.
    pub fn orphan_ad(&self, ad_id: &Uuid) {
        for mut record in self.jobs.iter_mut() {
            if record.ad_id == Some(*ad_id) && !record.state.is_terminal() {
                debug!(correlation_id = %record.correlation_id, "job orphaned");
                record.state = JobState::Orphaned;
            }
        }
    }

    /// Mark every live job as orphaned (session abandoned).
    pub fn orphan_all(&self) {
        for mut record in self.jobs.iter_mut() {
            if !record.state.is_terminal() {
                record.state = JobState::Orphaned;
            }
        }
    }

    /// Fail every pending or orphaned job older than `timeout` so no
    /// caller waits forever. Returns the jobs released by the expiry,
    /// including any buffered successors it unblocks.
    pub fn expire_overdue(&self, timeout: Duration, now: DateTime<Utc>) -> Vec<ReadyJob> {
        let overdue: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|record| {
                matches!(record.state, JobState::Pending | JobState::Orphaned)
                    && now - record.acked_at.unwrap_or(record.issued_at) > timeout
            })
            .map(|record| record.correlation_id)
            .collect();

        let mut released = Vec::new();
        for correlation_id in overdue {
            metrics::counter!("generation.jobs_expired").increment(1);
            if let Enqueued::Ready(ready) = self.enqueue(
                correlation_id,
                EventOutcome::Failed {
                    kind: FailureKind::Timeout,
                    message: "job exceeded pending threshold".to_string(),
                },
            ) {
                released.extend(ready);
            }
        }
        released
    }

    /// Transition a record to its terminal state. Returns the ready job,
    /// or None if the record vanished.
    fn resolve(&self, correlation_id: &Uuid, outcome: EventOutcome) -> Option<ReadyJob> {
        let mut record = self.jobs.get_mut(correlation_id)?;
        let was_orphaned = record.state == JobState::Orphaned;
        record.state = match &outcome {
            EventOutcome::Completed(_) => JobState::Completed,
            EventOutcome::Failed { kind, .. } => JobState::Failed(*kind),
        };
        record.resolved_at = Some(Utc::now());
        Some(ReadyJob {
            record: record.clone(),
            outcome,
            was_orphaned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed() -> EventOutcome {
        EventOutcome::Completed(JobPayload::ChatEdit {
            final_image_url: "https://cdn.example.com/v2.png".into(),
            textless_image_url: None,
            summary: "done".into(),
        })
    }

    fn failed(kind: FailureKind) -> EventOutcome {
        EventOutcome::Failed {
            kind,
            message: "boom".into(),
        }
    }

    fn ready_len(enqueued: &Enqueued) -> usize {
        match enqueued {
            Enqueued::Ready(ready) => ready.len(),
            _ => panic!("expected Ready, got {enqueued:?}"),
        }
    }

    #[test]
    fn test_edit_jobs_get_increasing_sequences_per_ad() {
        let tracker = JobTracker::new();
        let ad_a = Uuid::new_v4();
        let ad_b = Uuid::new_v4();

        let first = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad_a), None);
        let second = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad_a), None);
        let other = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad_b), None);
        let copy = tracker.register(Uuid::new_v4(), JobKind::AdCopy, None, None);

        assert_eq!(first.seq, Some(0));
        assert_eq!(second.seq, Some(1));
        assert_eq!(other.seq, Some(0));
        assert_eq!(copy.seq, None);
    }

    #[test]
    fn test_out_of_order_completions_release_in_issue_order() {
        let tracker = JobTracker::new();
        let ad = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..3)
            .map(|_| {
                let record =
                    tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
                tracker.mark_pending(&record.correlation_id);
                record.correlation_id
            })
            .collect();

        // Last edit completes first: nothing releasable yet.
        let enqueued = tracker.enqueue(ids[2], completed());
        assert_eq!(ready_len(&enqueued), 0);

        // First edit completes: releases itself only (slot 1 missing).
        let enqueued = tracker.enqueue(ids[0], completed());
        match &enqueued {
            Enqueued::Ready(ready) => {
                assert_eq!(ready.len(), 1);
                assert_eq!(ready[0].record.correlation_id, ids[0]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        // Middle edit completes: releases itself and the buffered third.
        let enqueued = tracker.enqueue(ids[1], completed());
        match enqueued {
            Enqueued::Ready(ready) => {
                let order: Vec<Uuid> = ready.iter().map(|r| r.record.correlation_id).collect();
                assert_eq!(order, vec![ids[1], ids[2]]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_terminal_transition_happens_once() {
        let tracker = JobTracker::new();
        let record = tracker.register(Uuid::new_v4(), JobKind::AdImage, None, None);
        tracker.mark_pending(&record.correlation_id);

        assert_eq!(ready_len(&tracker.enqueue(record.correlation_id, completed())), 1);
        assert!(matches!(
            tracker.enqueue(record.correlation_id, completed()),
            Enqueued::Duplicate
        ));
        assert!(matches!(
            tracker.enqueue(record.correlation_id, failed(FailureKind::Fetch)),
            Enqueued::Duplicate
        ));
        assert_eq!(
            tracker.job(&record.correlation_id).unwrap().state,
            JobState::Completed
        );
    }

    #[test]
    fn test_unknown_correlation_id_is_dropped() {
        let tracker = JobTracker::new();
        assert!(matches!(
            tracker.enqueue(Uuid::new_v4(), completed()),
            Enqueued::Unknown
        ));
    }

    #[test]
    fn test_failed_edit_advances_the_sequence() {
        let tracker = JobTracker::new();
        let ad = Uuid::new_v4();
        let first = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
        let second = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
        tracker.mark_pending(&first.correlation_id);
        tracker.mark_pending(&second.correlation_id);

        // Second completes first, then the first fails: both release, in
        // order, and the failure does not wedge the ad's sequence.
        assert_eq!(ready_len(&tracker.enqueue(second.correlation_id, completed())), 0);
        let enqueued = tracker.enqueue(first.correlation_id, failed(FailureKind::Fetch));
        match enqueued {
            Enqueued::Ready(ready) => {
                assert_eq!(ready.len(), 2);
                assert_eq!(
                    ready[0].record.state,
                    JobState::Failed(FailureKind::Fetch)
                );
                assert_eq!(ready[1].record.state, JobState::Completed);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_expire_overdue_fails_stale_jobs_and_unblocks_successors() {
        let tracker = JobTracker::new();
        let ad = Uuid::new_v4();
        let stuck = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
        let next = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
        tracker.mark_pending(&stuck.correlation_id);
        tracker.mark_pending(&next.correlation_id);

        // Successor completed but is stuck behind the silent first edit.
        assert_eq!(ready_len(&tracker.enqueue(next.correlation_id, completed())), 0);

        let later = Utc::now() + Duration::seconds(300);
        let released = tracker.expire_overdue(Duration::seconds(120), later);
        assert_eq!(released.len(), 2);
        assert_eq!(
            released[0].record.state,
            JobState::Failed(FailureKind::Timeout)
        );
        assert_eq!(released[1].record.state, JobState::Completed);
    }

    #[test]
    fn test_expire_overdue_spares_fresh_jobs() {
        let tracker = JobTracker::new();
        let record = tracker.register(Uuid::new_v4(), JobKind::AdImage, None, None);
        tracker.mark_pending(&record.correlation_id);

        let released = tracker.expire_overdue(Duration::seconds(120), Utc::now());
        assert!(released.is_empty());
        assert_eq!(
            tracker.job(&record.correlation_id).unwrap().state,
            JobState::Pending
        );
    }

    #[test]
    fn test_orphaned_job_resolution_reports_orphan_flag() {
        let tracker = JobTracker::new();
        let ad = Uuid::new_v4();
        let record = tracker.register(Uuid::new_v4(), JobKind::ChatEdit, Some(ad), None);
        tracker.mark_pending(&record.correlation_id);
        tracker.orphan_ad(&ad);

        assert_eq!(
            tracker.job(&record.correlation_id).unwrap().state,
            JobState::Orphaned
        );
        match tracker.enqueue(record.correlation_id, completed()) {
            Enqueued::Ready(ready) => {
                assert_eq!(ready.len(), 1);
                assert!(ready[0].was_orphaned);
                assert_eq!(ready[0].record.state, JobState::Completed);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
