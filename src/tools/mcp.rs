//! Registry entries that forward to capability server tools.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{Tool, ToolContext, ToolResult};
use crate::error::Result;
use crate::mcp::{McpToolInfo, McpToolProvider, McpToolRequest};

/// Proxies one server tool. Registered as `<server>__<tool>` so tools with
/// the same name on different servers do not collide.
pub struct McpProxyTool {
    provider: Arc<McpToolProvider>,
    info: McpToolInfo,
    name: String,
    description: String,
}

impl McpProxyTool {
    pub fn new(provider: Arc<McpToolProvider>, info: McpToolInfo) -> Self {
        let name = proxy_name(&info.mcp_source, &info.tool.name);
        let description = info
            .tool
            .description
            .clone()
            .unwrap_or_else(|| format!("Tool '{}' from MCP server '{}'", info.tool.name, info.mcp_source));
        Self {
            provider,
            info,
            name,
            description,
        }
    }

    pub fn server(&self) -> &str {
        &self.info.mcp_source
    }
}

/// Registry name for a server tool. Characters a model API would reject in
/// a function name become `_`.
pub fn proxy_name(server: &str, tool: &str) -> String {
    format!("{}__{}", server, tool)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.info.tool.input_schema.clone()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let request = McpToolRequest {
            mcp_source: self.info.mcp_source.clone(),
            name: self.info.tool.name.clone(),
            args,
        };
        let result = self.provider.execute_tool(&request).await?;
        let text = result.text();
        if result.is_error {
            Ok(ToolResult::error(text))
        } else {
            Ok(ToolResult::new(text))
        }
    }
}
