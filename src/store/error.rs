//! Error types for conversation and plan persistence.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a [`Store`](super::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No conversation with the given id exists
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// No plan exists for the given id
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// The backing server answered with an error status
    #[error("server error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The request never reached the backend
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error means "the record does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ConversationNotFound(_) | StoreError::PlanNotFound(_)
        )
    }
}
