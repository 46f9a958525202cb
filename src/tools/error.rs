//! Error types for tools and the tool registry.

use thiserror::Error;

/// Errors that can occur while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("Tool '{0}' already registered")]
    Conflict(String),

    /// The tool name is invalid (empty or contains invalid characters).
    #[error("Invalid tool name '{0}': must be non-empty and contain only alphanumeric characters, underscores, or hyphens")]
    InvalidName(String),

    /// The requested tool was not found.
    #[error("Tool '{0}' not found")]
    NotFound(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by a tool function.
///
/// These never abort a turn; the orchestrator reports them to the model as an
/// error tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not match the tool's input shape
    #[error("invalid tool input: {0}")]
    Decode(#[from] serde_json::Error),

    /// The tool ran and failed
    #[error("{0}")]
    Execution(String),

    /// A plan tool was called without a plan
    #[error("no plan available for this tool")]
    MissingPlan,

    /// Filesystem failure
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// Result type for tool functions.
pub type ToolCallResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::Conflict("read_file".to_string());
        assert!(err.to_string().contains("read_file"));

        let err = RegistryError::InvalidName("bad name!".to_string());
        assert!(err.to_string().contains("bad name!"));

        let err = ToolError::execution("unknown action");
        assert_eq!(err.to_string(), "unknown action");
    }
}
