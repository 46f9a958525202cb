//! Error types for MCP tool servers.

use thiserror::Error;

/// Errors raised while talking to an MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server answered, but the call failed
    #[error("MCP server '{server}' error: {message}")]
    Server {
        /// Server name
        server: String,
        /// Error description
        message: String,
    },

    /// The server returned a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Connection or protocol failure
    #[error("MCP transport error: {0}")]
    Transport(String),

    /// The call did not finish in time
    #[error("MCP call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The call was cancelled through its token
    #[error("MCP call cancelled")]
    Cancelled,
}

impl McpError {
    /// Create a server error
    pub fn server(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            server: server.into(),
            message: message.into(),
        }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;
