//! Delegated agent runs for the `spawn` and `subagent` tools.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::context::ContextBuilder;
use super::r#loop::run_iterations;
use crate::config::AgentConfig;
use crate::providers::LLMProvider;
use crate::session::{Message, Session};
use crate::tools::{TaskRunner, ToolContext, ToolRegistry, ToolResult};

const SUBAGENT_PROMPT: &str = "You are a sub-agent working on a single delegated task. \
Complete it with the tools available and reply with the result only.";

/// Runs a delegated task in a throwaway session.
///
/// The history is not persisted and the tool set is fixed at construction.
pub struct SubagentManager {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    context: ContextBuilder,
    max_iterations: usize,
    workspace: Option<String>,
}

impl SubagentManager {
    pub fn new(config: &AgentConfig, provider: Arc<dyn LLMProvider>, tools: ToolRegistry) -> Self {
        let prompt = format!("{}\n\n{}", config.system_prompt.trim_end(), SUBAGENT_PROMPT);
        let context = ContextBuilder::new(prompt).with_tools(tools.to_tool_schema());
        Self {
            provider,
            tools,
            context,
            max_iterations: config.subagent_max_iterations,
            workspace: config.workspace.clone(),
        }
    }
}

#[async_trait]
impl TaskRunner for SubagentManager {
    async fn run_task(&self, task: &str) -> ToolResult {
        let key = format!("subagent:{}", Uuid::new_v4());
        info!(session = %key, "Starting delegated task");

        let mut session = Session::new(&key);
        session.add_message(Message::user(task));

        let mut tool_ctx = ToolContext::new().with_session(&key);
        if let Some(workspace) = &self.workspace {
            tool_ctx = tool_ctx.with_workspace(workspace);
        }

        run_iterations(
            self.provider.as_ref(),
            &self.tools,
            &self.context,
            &tool_ctx,
            self.max_iterations,
            &mut session,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClawError;
    use crate::providers::{LLMResponse, MockLLMProvider};
    use crate::session::{Role, ToolCall};
    use crate::tools::{EchoTool, SubagentTool, Tool};
    use serde_json::json;

    #[tokio::test]
    async fn test_runs_task_in_fresh_session() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_generate()
            .times(1)
            .returning(|messages| {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, Role::System);
                assert!(messages[0].content.contains("sub-agent"));
                assert_eq!(messages[1].content, "count files");
                Ok(LLMResponse::text("42 files"))
            });

        let manager = SubagentManager::new(&AgentConfig::default(), Arc::new(provider), ToolRegistry::new());
        let result = manager.run_task("count files").await;
        assert!(!result.is_error);
        assert_eq!(result.for_llm, "42 files");
    }

    #[tokio::test]
    async fn test_respects_own_iteration_cap() {
        let mut provider = MockLLMProvider::new();
        provider.expect_generate().times(2).returning(|_| {
            Ok(LLMResponse::with_tool_calls(
                "",
                vec![ToolCall::new("c", "echo", r#"{"message": "again"}"#)],
            ))
        });

        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        let config = AgentConfig {
            subagent_max_iterations: 2,
            ..Default::default()
        };
        let manager = SubagentManager::new(&config, Arc::new(provider), tools);

        let result = manager.run_task("loop").await;
        assert!(result.is_error);
        assert!(matches!(result.error.as_deref(), Some(ClawError::IterationLimit(2))));
    }

    #[tokio::test]
    async fn test_subagent_tool_over_manager() {
        let mut provider = MockLLMProvider::new();
        provider
            .expect_generate()
            .returning(|_| Ok(LLMResponse::text("y".repeat(800))));

        let manager = Arc::new(SubagentManager::new(&AgentConfig::default(), Arc::new(provider), ToolRegistry::new()));
        let tool = SubagentTool::new(manager);
        let result = tool
            .execute(json!({"task": "write a lot"}), &ToolContext::new())
            .await
            .unwrap();

        assert_eq!(result.for_llm.len(), 800);
        assert_eq!(result.for_user.unwrap().len(), 503);
        assert!(!result.is_async);
    }
}
