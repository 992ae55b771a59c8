//! Name-keyed tool registry.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CommandGuard, Tool, ToolContext, ToolResult};
use crate::error::ClawError;

/// Holds every tool the model may call and is the single place they run.
///
/// `execute` never fails: unknown tools, tool errors and guard refusals all
/// come back as error [`ToolResult`]s.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    guard: Option<CommandGuard>,
}

impl ToolRegistry {
    /// Registry without the command guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that checks shell tool arguments before running them.
    pub fn with_command_guard() -> Self {
        Self {
            tools: HashMap::new(),
            guard: Some(CommandGuard::new()),
        }
    }

    pub fn has_command_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.register_shared(Arc::from(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced existing tool");
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool with an empty context.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        self.execute_with_context(name, args, &ToolContext::new()).await
    }

    pub async fn execute_with_context(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return ToolResult::error(format!("Error: tool '{}' not found", name))
                .with_error(ClawError::Tool(format!("tool '{}' not found", name)));
        };

        if tool.is_shell_tool() {
            if let Some(guard) = &self.guard {
                if let Some((command, reason)) = guard.check_args(&args) {
                    warn!(tool = %name, command, reason, "Blocked dangerous command");
                    return ToolResult::error(format!(
                        "Blocked: command '{}' was refused ({})",
                        command, reason
                    ));
                }
            }
        }

        debug!(tool = %name, "Executing tool");
        match tool.execute(args, ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool failed");
                ToolResult::error(format!("Error: {}", e)).with_error(e)
            }
        }
    }

    /// Function-calling schema for every tool, sorted by name.
    ///
    /// Each entry is `{"type": "function", "function": {name, description,
    /// parameters}}` where `parameters` is an object schema that always has
    /// `properties` and a `required` list.
    pub fn to_tool_schema(&self) -> Vec<Value> {
        let mut tools: Vec<&Arc<dyn Tool>> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
            .into_iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": normalize_parameters(tool.parameters()),
                    }
                })
            })
            .collect()
    }
}

fn normalize_parameters(schema: Value) -> Value {
    let mut schema = match schema {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    schema.entry("type").or_insert_with(|| json!("object"));
    schema.entry("properties").or_insert_with(|| json!({}));
    schema.entry("required").or_insert_with(|| json!([]));
    Value::Object(schema)
}
