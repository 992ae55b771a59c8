//! MCP module - Capability servers over line-delimited JSON-RPC
//!
//! Capability servers are subprocesses that read one JSON request per line
//! on stdin and print one JSON response per line on stdout.
//!
//! - [`McpClient`] owns one server: it correlates responses to requests by
//!   id, enforces per-request timeouts and retries `tools/call`.
//! - [`ServerSupervisor`] keeps at most one client per server name.
//! - [`McpToolProvider`] starts enabled servers on demand, aggregates their
//!   tools and routes calls back to the owning server.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clawcore::config::{McpServerConfig, MemoryServerStore};
//! use clawcore::mcp::{McpToolProvider, ProcessClientFactory, ServerSupervisor};
//!
//! # async fn run() -> clawcore::Result<()> {
//! let store = Arc::new(MemoryServerStore::with_servers([
//!     McpServerConfig::new("fs", "npx").with_args(["-y", "@modelcontextprotocol/server-filesystem", "."]),
//! ]));
//! let supervisor = Arc::new(ServerSupervisor::new(Arc::new(ProcessClientFactory::default())));
//! let provider = McpToolProvider::new(store, supervisor.clone());
//!
//! for tool in provider.get_available_tools().await? {
//!     println!("{}: {}", tool.mcp_source, tool.tool.name);
//! }
//! supervisor.stop_all().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod protocol;
pub mod provider;
pub mod retry;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{CallOptions, McpClient, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::{CallToolResult, ContentItem, McpResource, McpTool, ResourceContents};
pub use provider::{McpToolInfo, McpToolProvider, McpToolRequest};
pub use retry::RetryPolicy;
pub use supervisor::{ClientFactory, ProcessClientFactory, ServerStatus, ServerSupervisor};
