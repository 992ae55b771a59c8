//! Delegation tools: hand a subtask to another agent run.
//!
//! `spawn` is fire-and-forget. The delegated run happens on a background
//! task whose outcome only reaches the log. `subagent` waits for the
//! delegate and returns its answer.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::{required_str, Tool, ToolContext, ToolResult};
use crate::error::Result;

/// Longest `for_user` text the synchronous delegate returns, in characters.
pub const MAX_USER_CHARS: usize = 500;

/// Runs one delegated task to completion.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: &str) -> ToolResult;
}

fn task_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": description
            }
        },
        "required": ["task"]
    })
}

/// Starts a delegate in the background and returns immediately.
pub struct SpawnTool {
    runner: Arc<dyn TaskRunner>,
    tracker: TaskTracker,
}

impl SpawnTool {
    pub fn new(runner: Arc<dyn TaskRunner>, tracker: TaskTracker) -> Self {
        Self { runner, tracker }
    }
}

#[async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Start a background agent for an independent task. Returns immediately; the result is not reported back."
    }

    fn parameters(&self) -> Value {
        task_schema("Task for the background agent")
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let task = required_str(&args, "task")?.to_string();

        // Delegates may not spawn further delegates.
        if task.to_lowercase().contains("spawn") {
            warn!(task = %task, "Rejected recursive spawn");
            return Ok(ToolResult::error(
                "Error: spawned tasks cannot spawn further tasks",
            ));
        }

        let runner = Arc::clone(&self.runner);
        let background = task.clone();
        self.tracker.spawn(async move {
            let result = runner.run_task(&background).await;
            if result.is_error {
                warn!(task = %background, error = %result.for_llm, "Background task failed");
            } else {
                info!(task = %background, "Background task finished");
            }
        });

        Ok(ToolResult::async_result(format!(
            "Started background task: {}",
            task
        )))
    }
}

/// Runs a delegate and waits for its answer.
pub struct SubagentTool {
    runner: Arc<dyn TaskRunner>,
}

impl SubagentTool {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for SubagentTool {
    fn name(&self) -> &str {
        "subagent"
    }

    fn description(&self) -> &str {
        "Run a sub-agent on a focused task and wait for its answer"
    }

    fn parameters(&self) -> Value {
        task_schema("Task for the sub-agent")
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let task = required_str(&args, "task")?;
        let mut result = self.runner.run_task(task).await;
        result.is_async = false;
        result.for_user = Some(truncate_chars(&result.for_llm, MAX_USER_CHARS));
        Ok(result)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedRunner {
        answer: String,
        runs: AtomicUsize,
    }

    impl FixedRunner {
        fn new(answer: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.into(),
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskRunner for FixedRunner {
        async fn run_task(&self, _task: &str) -> ToolResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ToolResult::async_result(self.answer.clone())
        }
    }

    struct SlowRunner;

    #[async_trait]
    impl TaskRunner for SlowRunner {
        async fn run_task(&self, _task: &str) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolResult::new("late")
        }
    }

    #[tokio::test]
    async fn test_spawn_rejects_recursive_task() {
        let runner = FixedRunner::new("done");
        let tracker = TaskTracker::new();
        let tool = SpawnTool::new(runner.clone(), tracker.clone());

        let result = tool
            .execute(json!({"task": "please spawn more work"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(result.is_error);

        tracker.close();
        tracker.wait().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_case_insensitive() {
        let tool = SpawnTool::new(FixedRunner::new("done"), TaskTracker::new());
        let result = tool
            .execute(json!({"task": "SPAWN workers"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_spawn_returns_async_result() {
        let runner = FixedRunner::new("done");
        let tracker = TaskTracker::new();
        let tool = SpawnTool::new(runner.clone(), tracker.clone());

        let result = tool
            .execute(json!({"task": "fetch news"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(result.is_async);
        assert!(!result.is_error);
        assert!(result.for_llm.contains("fetch news"));

        tracker.close();
        tracker.wait().await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_does_not_wait_for_delegate() {
        let tracker = TaskTracker::new();
        let tool = SpawnTool::new(Arc::new(SlowRunner), tracker.clone());

        let started = tokio::time::Instant::now();
        let result = tool
            .execute(json!({"task": "long job"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(result.is_async);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_spawn_missing_task() {
        let tool = SpawnTool::new(FixedRunner::new("done"), TaskTracker::new());
        assert!(tool.execute(json!({}), &ToolContext::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_subagent_truncates_user_text() {
        let long = "x".repeat(1000);
        let tool = SubagentTool::new(FixedRunner::new(long.clone()));

        let result = tool
            .execute(json!({"task": "summarize"}), &ToolContext::new())
            .await
            .unwrap();

        assert!(!result.is_async);
        assert_eq!(result.for_llm, long);
        let for_user = result.for_user.unwrap();
        assert!(for_user.chars().count() <= MAX_USER_CHARS + 3);
        assert!(for_user.ends_with("..."));
    }

    #[tokio::test]
    async fn test_subagent_short_text_untouched() {
        let tool = SubagentTool::new(FixedRunner::new("short answer"));
        let result = tool
            .execute(json!({"task": "t"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(result.for_user.as_deref(), Some("short answer"));
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 4), "éééé...");
        assert_eq!(truncate_chars(&text, 10), text);
    }
}
