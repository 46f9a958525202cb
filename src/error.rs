//! Crate-level error type returned by the orchestrator.

use std::time::Duration;
use thiserror::Error;

use crate::inference::LlmError;
use crate::store::StoreError;

/// Result type for orchestrator operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that abort a turn.
///
/// Tool failures are not listed here: they are returned to the model as
/// error tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    /// History or tools could not be converted to the provider format
    #[error("translation error: {0}")]
    Translation(#[source] LlmError),

    /// The provider call failed
    #[error("inference error: {0}")]
    Inference(#[source] LlmError),

    /// Persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed input to a delegated call
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The subagent could not produce an answer
    #[error("subagent error: {0}")]
    Subagent(String),

    /// A delegated call did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The turn was cancelled through its token
    #[error("turn cancelled")]
    Cancelled,
}

impl From<LlmError> for AgentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => AgentError::Cancelled,
            err if err.is_translation() => AgentError::Translation(err),
            err => AgentError::Inference(err),
        }
    }
}
