// ================================================================
// File: roomkeep-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Cleanup step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Unsafe cleanup step rejected: {0}")]
    UnsafeStep(String),

    #[error("A cleanup pass is already in progress")]
    CleanupInProgress,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("View store error: {0}")]
    ViewStore(String),

    #[error("Message source error: {0}")]
    MessageSource(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Collaborator-unavailable errors are treated as a no-op success by the
    /// cleanup pipeline; everything else counts as a step failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::CollaboratorUnavailable(_))
    }
}
