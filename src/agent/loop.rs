//! The bounded decision loop.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::context::ContextBuilder;
use super::subagent::SubagentManager;
use crate::config::AgentConfig;
use crate::error::ClawError;
use crate::providers::LLMProvider;
use crate::session::{Message, Session, SessionManager, ToolCall};
use crate::tools::{EchoTool, ShellTool, SpawnTool, SubagentTool, Tool, ToolContext, ToolRegistry, ToolResult};

/// Returned when the model finishes without saying anything.
pub const NO_CONTENT_MESSAGE: &str = "The model returned no content.";

/// Drives one user message to a final answer.
///
/// Each iteration sends the system context plus the session history to the
/// model. A response without tool calls ends the loop; otherwise every tool
/// call runs through the registry, its output is appended to the history
/// and the loop continues, up to `max_iterations` model calls.
pub struct AgentLoop {
    config: AgentConfig,
    provider: Arc<dyn LLMProvider>,
    tools: RwLock<ToolRegistry>,
    sessions: SessionManager,
    tracker: TaskTracker,
}

impl AgentLoop {
    /// Create a loop over `tools`.
    ///
    /// `spawn` and `subagent` are added on top. Delegates get a snapshot of
    /// `tools` as passed in, so they cannot delegate again.
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn LLMProvider>,
        mut tools: ToolRegistry,
        sessions: SessionManager,
    ) -> Self {
        let tracker = TaskTracker::new();
        let delegate = Arc::new(SubagentManager::new(&config, Arc::clone(&provider), tools.clone()));
        tools.register(Box::new(SpawnTool::new(delegate.clone(), tracker.clone())));
        tools.register(Box::new(SubagentTool::new(delegate)));

        Self {
            config,
            provider,
            tools: RwLock::new(tools),
            sessions,
            tracker,
        }
    }

    /// Built-in `shell` and `echo` tools, guarded when the config asks for it.
    pub fn default_tools(config: &AgentConfig) -> ToolRegistry {
        let mut tools = if config.command_guard {
            ToolRegistry::with_command_guard()
        } else {
            ToolRegistry::new()
        };
        tools.register(Box::new(ShellTool));
        tools.register(Box::new(EchoTool));
        tools
    }

    /// Add a tool for subsequent messages. Delegates do not see it.
    pub async fn register_tool(&self, tool: Box<dyn Tool>) {
        self.tools.write().await.register(tool);
    }

    pub async fn tool_names(&self) -> Vec<String> {
        self.tools.read().await.names()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Process one user message in `session_key`.
    ///
    /// Never fails: model errors and the iteration cap come back as error
    /// results. The session is saved in every case.
    pub async fn process_message(&self, session_key: &str, content: &str) -> ToolResult {
        let _session_guard = self.sessions.lock(session_key).await;

        let mut session = self.sessions.get_or_create(session_key).await;
        session.add_message(Message::user(content));

        let tools = self.tools.read().await.clone();
        let context = ContextBuilder::new(self.config.system_prompt.as_str()).with_tools(tools.to_tool_schema());
        let mut tool_ctx = ToolContext::new().with_session(session_key);
        if let Some(workspace) = &self.config.workspace {
            tool_ctx = tool_ctx.with_workspace(workspace);
        }

        info!(session = %session_key, "Processing message");
        let result = run_iterations(
            self.provider.as_ref(),
            &tools,
            &context,
            &tool_ctx,
            self.config.max_iterations,
            &mut session,
        )
        .await;

        self.sessions.update(session).await;
        if let Err(e) = self.sessions.save(session_key).await {
            warn!(session = %session_key, error = %e, "Failed to save session");
        }
        result
    }

    /// Wait for every background `spawn` task to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(tasks = self.tracker.len(), "Waiting for background tasks");
        }
        self.tracker.wait().await;
    }
}

/// The iteration body shared by the main loop and delegates.
pub(crate) async fn run_iterations(
    provider: &dyn LLMProvider,
    tools: &ToolRegistry,
    context: &ContextBuilder,
    tool_ctx: &ToolContext,
    max_iterations: usize,
    session: &mut Session,
) -> ToolResult {
    let max_iterations = max_iterations.max(1);

    for iteration in 1..=max_iterations {
        let messages = context.build_messages(session);
        debug!(session = %session.key, iteration, messages = messages.len(), "Calling model");

        let response = match provider.generate(&messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!(session = %session.key, iteration, error = %e, "Model call failed");
                return ToolResult::error(format!("Error: model call failed: {}", e)).with_error(e);
            }
        };

        // Tool results must follow the assistant turn that requested them.
        if !response.content.is_empty() || response.has_tool_calls() {
            session.add_message(Message::assistant_with_tools(
                &response.content,
                response.tool_calls.clone(),
            ));
        }

        if response.tool_calls.is_empty() {
            debug!(session = %session.key, iteration, "Final answer");
            if response.content.is_empty() {
                return ToolResult::new(NO_CONTENT_MESSAGE);
            }
            return ToolResult::user(response.content);
        }

        for call in &response.tool_calls {
            let result = execute_call(tools, tool_ctx, call).await;
            session.add_message(Message::tool_result(&call.id, &result.for_llm).with_name(&call.name));
        }
    }

    warn!(session = %session.key, max_iterations, "Iteration limit reached");
    ToolResult::error(format!(
        "Error: reached the maximum of {} iterations without a final answer",
        max_iterations
    ))
    .with_error(ClawError::IterationLimit(max_iterations))
}

async fn execute_call(tools: &ToolRegistry, tool_ctx: &ToolContext, call: &ToolCall) -> ToolResult {
    let args = match parse_arguments(&call.arguments) {
        Ok(args) => args,
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Unparseable tool arguments");
            return ToolResult::error(format!(
                "Error: invalid arguments for tool '{}': {}",
                call.name, e
            ))
            .with_error(e.into());
        }
    };
    debug!(tool = %call.name, id = %call.id, "Running tool call");
    tools.execute_with_context(&call.name, args, tool_ctx).await
}

/// Empty argument text means no arguments.
fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}
