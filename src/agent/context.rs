//! Builds the message list sent to the model on every iteration.

use serde_json::Value;

use crate::session::{Message, Session};

/// Assembles the system message (identity, tool schemas, summary) and puts
/// it in front of the session history.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    tool_schemas: Vec<Value>,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            tool_schemas: Vec::new(),
        }
    }

    /// Tool schemas as produced by [`ToolRegistry::to_tool_schema`](crate::tools::ToolRegistry::to_tool_schema).
    pub fn with_tools(mut self, tool_schemas: Vec<Value>) -> Self {
        self.tool_schemas = tool_schemas;
        self
    }

    pub fn build_system_message(&self, summary: Option<&str>) -> Message {
        let mut prompt = self.system_prompt.trim_end().to_string();

        if !self.tool_schemas.is_empty() {
            prompt.push_str("\n\n## Available Tools\n\n");
            for schema in &self.tool_schemas {
                prompt.push_str(&schema.to_string());
                prompt.push('\n');
            }
        }

        if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
            prompt.push_str("\n\n## Conversation Summary\n\n");
            prompt.push_str(summary.trim());
        }

        Message::system(&prompt)
    }

    /// System message followed by the full session history.
    pub fn build_messages(&self, session: &Session) -> Vec<Message> {
        let mut messages = Vec::with_capacity(session.messages.len() + 1);
        messages.push(self.build_system_message(session.summary.as_deref()));
        messages.extend(session.messages.iter().cloned());
        messages
    }
}
