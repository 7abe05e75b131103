//! Generation orchestration: turns user intents into backend-accepted
//! jobs, tracks their lifecycle, and merges realtime completion events
//! into the workspace and credit ledger.
//!
//! # Modules
//!
//! - [`jobs`] — per-correlation-id job records, per-ad edit sequencing,
//!   and the reordering buffer
//! - [`coordinator`] — the [`coordinator::GenerationCoordinator`]
//! - [`chat`] — [`chat::ChatThreadController`], the per-ad chat façade

pub mod chat;
pub mod coordinator;
pub mod jobs;

pub use chat::ChatThreadController;
pub use coordinator::GenerationCoordinator;
pub use jobs::{EventOutcome, JobRecord, JobState, JobTracker};
