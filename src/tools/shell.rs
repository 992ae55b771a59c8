//! `shell`: run a command through `sh -c`.
//!
//! The tool reports itself as a shell tool, so a registry built with
//! [`ToolRegistry::with_command_guard`](super::ToolRegistry::with_command_guard)
//! screens its arguments before it runs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{ClawError, Result};

use super::{optional_u64, required_str, Tool, ToolContext, ToolResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runs `command` in the workspace directory, if the context has one.
///
/// stdout and stderr are both returned. A non-zero exit status is appended
/// as `[Exit code: N]` and marks the result as an error. The process is
/// killed once `timeout` seconds pass.
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its stdout and stderr"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command line passed to sh -c"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Seconds before the command is killed (default 60)"
                }
            },
            "required": ["command"]
        })
    }

    fn is_shell_tool(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = required_str(&args, "command")?;
        let timeout_secs = optional_u64(&args, "timeout").unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(ref workspace) = ctx.workspace {
            cmd.current_dir(workspace);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
            .await
            .map_err(|_| ClawError::Tool(format!("Command timed out after {}s", timeout_secs)))?
            .map_err(|e| ClawError::Tool(format!("Failed to execute command: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut text = String::new();
        if !stdout.is_empty() {
            text.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push_str("\n--- stderr ---\n");
            }
            text.push_str(&stderr);
        }

        if output.status.success() {
            return Ok(ToolResult::new(text));
        }

        let exit_code = output.status.code().unwrap_or(-1);
        text.push_str(&format!("\n[Exit code: {}]", exit_code));
        Ok(ToolResult {
            for_llm: text,
            is_error: true,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn run(args: Value) -> Result<ToolResult> {
        ShellTool.execute(args, &ToolContext::new()).await
    }

    #[tokio::test]
    async fn test_stdout_returned() {
        let result = run(json!({"command": "echo hello"})).await.unwrap();
        assert_eq!(result.for_llm.trim(), "hello");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_runs_in_workspace() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "from workspace").unwrap();

        let ctx = ToolContext::new().with_workspace(dir.path().to_str().unwrap());
        let result = ShellTool
            .execute(json!({"command": "cat notes.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.for_llm.trim(), "from workspace");
    }

    #[tokio::test]
    async fn test_stderr_appended() {
        let result = run(json!({"command": "echo stdout && echo stderr >&2"}))
            .await
            .unwrap();
        assert!(result.for_llm.contains("stdout"));
        assert!(result.for_llm.contains("stderr"));
        assert!(result.for_llm.contains("--- stderr ---"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let result = run(json!({"command": "exit 42"})).await.unwrap();
        assert!(result.is_error);
        assert!(result.for_llm.contains("[Exit code: 42]"));
    }

    #[tokio::test]
    async fn test_missing_command_argument() {
        let result = run(json!({})).await;
        assert!(result.unwrap_err().to_string().contains("Missing 'command'"));
    }

    #[tokio::test]
    async fn test_command_killed_after_timeout() {
        let result = run(json!({"command": "sleep 10", "timeout": 1})).await;
        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_pipeline() {
        let result = run(json!({"command": "printf 'a b c' | tr ' ' '-'"}))
            .await
            .unwrap();
        assert_eq!(result.for_llm, "a-b-c");
    }

    #[test]
    fn test_metadata() {
        assert_eq!(ShellTool.name(), "shell");
        assert!(ShellTool.is_shell_tool());
        let params = ShellTool.parameters();
        assert_eq!(params["required"][0], "command");
    }

    #[tokio::test]
    async fn test_guarded_registry_refuses_before_running() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let mut registry = super::super::ToolRegistry::with_command_guard();
        registry.register(Box::new(ShellTool));

        let command = format!("touch {} && rm -rf /", marker.display());
        let result = registry.execute("shell", json!({"command": command})).await;

        assert!(result.is_error);
        assert!(result.for_llm.contains("Blocked"));
        assert!(!marker.exists());
    }
}
