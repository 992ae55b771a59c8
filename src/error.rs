//! Error types for ClawCore
//!
//! Every fallible library operation returns [`Result`], whose error side is
//! [`ClawError`]. Tool failures and guard violations are not errors at this
//! level: they are folded into an error [`crate::tools::ToolResult`] at the
//! registry boundary.

use thiserror::Error;

/// Unified error type for the library.
#[derive(Debug, Error)]
pub enum ClawError {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem or pipe I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A tool rejected its input or failed while running.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session storage failure.
    #[error("Session error: {0}")]
    Session(String),

    /// The model provider failed to produce a response.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A request was issued before the capability server was started.
    #[error("MCP server '{0}' is not started")]
    NotStarted(String),

    /// The capability server answered with an `error` object.
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// No response arrived before the request's deadline.
    #[error("MCP request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The capability server went away while a request was outstanding.
    #[error("MCP server '{0}' disconnected")]
    Disconnected(String),

    /// No capability server is configured under this name.
    #[error("MCP server not found: {0}")]
    ServerNotFound(String),

    /// The agent loop used every iteration without a final answer.
    #[error("Iteration limit of {0} reached without a final answer")]
    IterationLimit(usize),

    /// The capability server process could not be launched.
    #[error("Failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClawError>;
