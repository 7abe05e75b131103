//! Session-owned workspace for the ad-creation wizard: the single mutable
//! aggregate holding product selection, templates, generated copy and ads,
//! and their chat threads. Owned exclusively by the active session and
//! discarded when the user abandons the flow.

pub mod wizard;
pub mod workspace;

pub use wizard::WizardStep;
pub use workspace::{AdData, AdWorkspace, AppliedEdit};
