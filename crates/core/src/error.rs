use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AdForgeResult<T> = Result<T, AdForgeError>;

#[derive(Error, Debug)]
pub enum AdForgeError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AdForgeError {
    /// Terminal failure kind recorded on a job when this error ends it.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::InsufficientCredits(_) => FailureKind::InsufficientCredits,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::NotFound(_) => FailureKind::NotFound,
            _ => FailureKind::Fetch,
        }
    }
}

/// Why a generation job reached a terminal `Failed` state. Serialized into
/// job records and surfaced to chat threads via `user_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unauthorized,
    InsufficientCredits,
    Fetch,
    Timeout,
    NotFound,
}

impl FailureKind {
    /// User-facing phrasing for chat threads. Timeouts read as a soft
    /// "still working" failure so the UI can offer a retry, distinct from
    /// a hard backend failure.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Unauthorized => "Your session has expired. Please sign in again.",
            Self::InsufficientCredits => {
                "You are out of credits. Add credits to keep editing this ad."
            }
            Self::Fetch => "Something went wrong while applying your edit. Please try again.",
            Self::Timeout => {
                "This edit is taking longer than expected. You can retry or check back shortly."
            }
            Self::NotFound => "The ad you were editing could not be found.",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unauthorized => "unauthorized",
            Self::InsufficientCredits => "insufficient_credits",
            Self::Fetch => "fetch",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
        };
        write!(f, "{label}")
    }
}
