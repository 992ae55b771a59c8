//! Echo tool, mostly useful for wiring checks.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool, ToolContext, ToolResult};
use crate::error::Result;

/// Returns its `message` argument unchanged.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo back the given message"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        Ok(ToolResult::new(required_str(&args, "message")?))
    }
}
