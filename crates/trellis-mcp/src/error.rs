//! Error types for the MCP crate.

use thiserror::Error;

/// Errors that can occur in the MCP server itself.
///
/// Failures of individual tool invocations are not errors at this level;
/// they are reported inside the uniform result envelope.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server failed to start.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Serialization failure on the wire.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO failure on the stdio transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
