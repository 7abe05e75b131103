//! Credit balance cache and change propagation.
//!
//! The backend is the source of truth for credits; [`CreditLedger`] only
//! caches and broadcasts. Independent ledger instances across isolated UI
//! trees converge by listening for `Signal::CreditsChanged` on the
//! process-wide hub and re-fetching.

pub mod ledger;

pub use ledger::{CreditLedger, ListenerId};
