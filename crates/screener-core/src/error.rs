use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ScreenError {
    /// Network/timeout/rate-limit failure. Eligible for retry.
    #[error("transient provider error: {0}")]
    TransientProvider(String),

    /// Symbol unknown or delisted. Never retried.
    #[error("permanent provider error: {0}")]
    PermanentProvider(String),

    /// History too short or a required field missing. The symbol is
    /// skipped (or the metric left absent), never fatal to the run.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid weights/thresholds. Fatal at startup, before any fetching.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A collaborator (sink, notifier, narrative service) failed. Logged
    /// and degraded, never fatal to a run.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl ScreenError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ScreenError::TransientProvider(_))
    }
}
