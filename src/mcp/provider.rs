//! Tools aggregated across every enabled capability server.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::client::{CallOptions, McpClient};
use super::protocol::{CallToolResult, McpResource, McpTool, ResourceContents};
use super::supervisor::ServerSupervisor;
use crate::config::{McpServerConfig, ServerConfigStore};
use crate::error::{ClawError, Result};
use crate::tools::{McpProxyTool, ToolRegistry};

/// A server tool tagged with the server it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolInfo {
    pub mcp_source: String,
    pub tool: McpTool,
}

/// Request to run a tool on a specific server.
#[derive(Debug, Clone)]
pub struct McpToolRequest {
    pub mcp_source: String,
    pub name: String,
    pub args: Value,
}

/// Bridges the server store and the supervisor: servers are started on
/// first use and calls are routed back to the server that owns the tool.
pub struct McpToolProvider {
    store: Arc<dyn ServerConfigStore>,
    supervisor: Arc<ServerSupervisor>,
    call_options: CallOptions,
}

impl McpToolProvider {
    /// Servers are read from `store` on every lookup and started through
    /// `supervisor`. Calls use [`CallOptions::default`].
    pub fn new(store: Arc<dyn ServerConfigStore>, supervisor: Arc<ServerSupervisor>) -> Self {
        Self {
            store,
            supervisor,
            call_options: CallOptions::default(),
        }
    }

    /// Retry and deadline settings for [`McpToolProvider::execute_tool`].
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.call_options = options;
        self
    }

    /// The supervisor owning this provider's clients.
    pub fn supervisor(&self) -> &Arc<ServerSupervisor> {
        &self.supervisor
    }

    /// Tools from every enabled server.
    ///
    /// A server that fails to start or list its tools contributes nothing;
    /// the failure is logged and the others are still collected.
    pub async fn get_available_tools(&self) -> Result<Vec<McpToolInfo>> {
        let servers = self.store.list_enabled().await?;
        let mut tools = Vec::new();

        for server in servers {
            match self.tools_for(&server).await {
                Ok(server_tools) => {
                    debug!(server = %server.name, count = server_tools.len(), "Collected MCP tools");
                    tools.extend(server_tools.into_iter().map(|tool| McpToolInfo {
                        mcp_source: server.name.clone(),
                        tool,
                    }));
                }
                Err(e) => {
                    warn!(server = %server.name, error = %e, "Skipping MCP server");
                }
            }
        }
        Ok(tools)
    }

    async fn tools_for(&self, server: &McpServerConfig) -> Result<Vec<McpTool>> {
        let client = self.supervisor.ensure_running(server).await?;
        client.list_tools().await
    }

    /// Running client for a configured server, started if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClawError::ServerNotFound`] when no server is configured
    /// under `name`, or the start error when it cannot be launched.
    pub async fn client(&self, name: &str) -> Result<Arc<McpClient>> {
        let server = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| ClawError::ServerNotFound(name.to_string()))?;
        self.supervisor.ensure_running(&server).await
    }

    /// Run a tool on the named server.
    ///
    /// The server is started on first use. Failures are retried according
    /// to the provider's call options.
    ///
    /// # Errors
    ///
    /// Fails like [`McpToolProvider::client`], or with the last attempt's
    /// error when every attempt fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(provider: &clawcore::McpToolProvider) -> clawcore::Result<()> {
    /// use clawcore::mcp::McpToolRequest;
    /// use serde_json::json;
    ///
    /// let result = provider
    ///     .execute_tool(&McpToolRequest {
    ///         mcp_source: "fs".into(),
    ///         name: "read_file".into(),
    ///         args: json!({"path": "README.md"}),
    ///     })
    ///     .await?;
    /// println!("{}", result.text());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute_tool(&self, request: &McpToolRequest) -> Result<CallToolResult> {
        let client = self.client(&request.mcp_source).await?;
        client
            .call_tool(&request.name, &request.args, self.call_options)
            .await
    }

    /// Resources of the named server.
    pub async fn list_resources(&self, server: &str) -> Result<Vec<McpResource>> {
        self.client(server).await?.list_resources().await
    }

    /// Read one resource from the named server.
    pub async fn read_resource(&self, server: &str, uri: &str) -> Result<Vec<ResourceContents>> {
        self.client(server).await?.read_resource(uri).await
    }

    /// Register a proxy tool for every available server tool.
    ///
    /// Returns the number of tools registered.
    pub async fn register_tools(self: &Arc<Self>, registry: &mut ToolRegistry) -> Result<usize> {
        let tools = self.get_available_tools().await?;
        let count = tools.len();
        for info in tools {
            registry.register(Box::new(McpProxyTool::new(Arc::clone(self), info)));
        }
        Ok(count)
    }
}
