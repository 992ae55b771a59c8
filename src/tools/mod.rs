//! Tools module - Callable capabilities exposed to the model
//!
//! Every tool implements [`Tool`]. Tools are collected in a
//! [`ToolRegistry`], which is the only place they are invoked from: it
//! converts failures into error [`ToolResult`]s and applies the
//! [`CommandGuard`] to shell tools.
//!
//! Arguments arrive as a JSON object (`serde_json::Value`). Tools pull typed
//! values out with [`required_str`], [`optional_str`] and [`optional_u64`]
//! instead of poking at the value directly.

pub mod delegate;
pub mod echo;
pub mod guard;
pub mod mcp;
pub mod registry;
pub mod shell;

pub use delegate::{SpawnTool, SubagentTool, TaskRunner};
pub use echo::EchoTool;
pub use guard::CommandGuard;
pub use mcp::McpProxyTool;
pub use registry::ToolRegistry;
pub use shell::ShellTool;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ClawError, Result};

/// Execution context handed to every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Working directory for tools that touch the filesystem or run commands.
    pub workspace: Option<String>,
    /// Session the call belongs to, if any.
    pub session_key: Option<String>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }

    pub fn with_session(mut self, key: &str) -> Self {
        self.session_key = Some(key.to_string());
        self
    }
}

/// Outcome of a tool call.
///
/// `for_llm` is always fed back to the model. `for_user` is optional text
/// meant for a human; `silent` suppresses it.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub for_llm: String,
    pub for_user: Option<String>,
    pub silent: bool,
    pub is_error: bool,
    /// The work continues in the background; `for_llm` only acknowledges it.
    pub is_async: bool,
    /// Underlying error, kept for diagnostics.
    pub error: Option<Arc<ClawError>>,
}

impl ToolResult {
    pub fn new(for_llm: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            ..Default::default()
        }
    }

    /// Same text for the model and the user.
    pub fn user(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            for_user: Some(content.clone()),
            for_llm: content,
            ..Default::default()
        }
    }

    pub fn silent(for_llm: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            silent: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            for_llm: message.into(),
            is_error: true,
            ..Default::default()
        }
    }

    pub fn async_result(for_llm: impl Into<String>) -> Self {
        Self {
            for_llm: for_llm.into(),
            is_async: true,
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: ClawError) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    pub fn with_user(mut self, for_user: impl Into<String>) -> Self {
        self.for_user = Some(for_user.into());
        self
    }
}

/// A capability the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Shell tools have their string arguments checked by the command guard.
    fn is_shell_tool(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ClawError::Tool(format!("Missing '{}' argument", key)))
}

/// Fetch an optional string argument; non-strings count as absent.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Fetch an optional unsigned integer, accepting numeric strings too.
pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
