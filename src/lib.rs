//! ClawCore - Execution core for a tool-calling coding agent
//!
//! - [`mcp`]: clients for capability servers speaking line-delimited JSON-RPC
//!   over stdio, a supervisor that owns them and a provider that aggregates
//!   their tools
//! - [`tools`]: the tool registry, command guard and built-in tools
//! - [`agent`]: the bounded decision loop and delegation
//! - [`session`]: conversation history persisted one file per session
//! - [`config`]: settings and the capability server store

pub mod agent;
pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::AgentLoop;
pub use config::Config;
pub use error::{ClawError, Result};
pub use mcp::{McpClient, McpToolProvider, ServerSupervisor};
pub use providers::{LLMProvider, LLMResponse};
pub use session::SessionManager;
pub use tools::{Tool, ToolRegistry, ToolResult};
