//! Error types for LLM clients.

use thiserror::Error;

/// Result type for LLM client operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors raised by an [`LlmClient`](super::LlmClient).
#[derive(Debug, Error)]
pub enum LlmError {
    /// There is nothing to translate or send
    #[error("{provider}: empty conversation history")]
    EmptyHistory {
        /// Provider that raised the error
        provider: String,
    },

    /// A message cannot be represented natively
    #[error("{provider}: invalid message: {reason}")]
    InvalidMessage {
        /// Provider that raised the error
        provider: String,
        /// What was wrong with the message
        reason: String,
    },

    /// Tool or response shape could not be converted
    #[error("{provider}: translation failed: {reason}")]
    Translation {
        /// Provider that raised the error
        provider: String,
        /// What failed to convert
        reason: String,
    },

    /// The completion call failed in transport or at the provider
    #[error("{provider}: inference failed: {message}")]
    InferenceFailure {
        /// Provider that raised the error
        provider: String,
        /// Transport or provider message
        message: String,
    },

    /// Token accounting call failed
    #[error("{provider}: token count failed: {message}")]
    TokenCount {
        /// Provider that raised the error
        provider: String,
        /// Transport or provider message
        message: String,
    },

    /// The call was cancelled through its token
    #[error("inference cancelled")]
    Cancelled,
}

impl LlmError {
    /// Create an empty-history error
    pub fn empty_history(provider: impl Into<String>) -> Self {
        Self::EmptyHistory {
            provider: provider.into(),
        }
    }

    /// Create an invalid-message error
    pub fn invalid_message(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a translation error
    pub fn translation(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Translation {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an inference failure
    pub fn inference(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InferenceFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error comes from native-format conversion
    pub fn is_translation(&self) -> bool {
        matches!(
            self,
            LlmError::EmptyHistory { .. }
                | LlmError::InvalidMessage { .. }
                | LlmError::Translation { .. }
        )
    }
}
