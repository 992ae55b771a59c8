//! Configuration for ClawCore
//!
//! Settings live in `~/.clawcore/config.json` (or `$CLAWCORE_HOME/config.json`)
//! and can be overridden from the environment, including a `.env` file in the
//! working directory.
//!
//! ```json
//! {
//!   "agent": { "max_iterations": 8, "command_guard": true },
//!   "mcp": { "request_timeout_ms": 30000, "call_retries": 3, "call_backoff_ms": 500 }
//! }
//! ```

pub mod servers;

pub use servers::{JsonServerStore, McpServerConfig, MemoryServerStore, ServerConfigStore};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClawError, Result};

/// Default identity placed at the top of every system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ClawCore, a coding agent. \
Use the available tools when they help you answer, and reply with a final \
answer once the task is done.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub mcp: McpSettings,
    /// Where session files are stored. Defaults to `<config dir>/sessions`.
    pub sessions_dir: Option<PathBuf>,
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model calls per user message.
    pub max_iterations: usize,
    /// Upper bound on model calls for delegated (`spawn`/`subagent`) work.
    pub subagent_max_iterations: usize,
    pub system_prompt: String,
    /// Scan arguments of shell tools against the deny-list before running them.
    pub command_guard: bool,
    /// Working directory handed to tools.
    pub workspace: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            subagent_max_iterations: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            command_guard: true,
            workspace: None,
        }
    }
}

/// Capability server client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    /// Default per-request deadline.
    pub request_timeout_ms: u64,
    /// Attempts per `tools/call` (minimum 1).
    pub call_retries: u32,
    /// Base delay between `tools/call` attempts, doubled each retry.
    pub call_backoff_ms: u64,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            call_retries: 3,
            call_backoff_ms: 500,
        }
    }
}

impl McpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Configuration directory: `$CLAWCORE_HOME`, else `~/.clawcore`.
    pub fn dir() -> PathBuf {
        if let Some(home) = std::env::var_os("CLAWCORE_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clawcore")
    }

    /// Path of the main config file.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Path of the capability server store.
    pub fn servers_path() -> PathBuf {
        Self::dir().join("mcp_servers.json")
    }

    /// Load from the default location, then apply `.env` and environment
    /// overrides.
    pub fn load() -> Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::path())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ClawError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the configuration as pretty JSON.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        crate::utils::write_atomic(path, content).await
    }

    /// Apply `CLAWCORE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CLAWCORE_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_override("CLAWCORE_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("CLAWCORE_COMMAND_GUARD") {
            self.agent.command_guard = parse_override("CLAWCORE_COMMAND_GUARD", &v)?;
        }
        if let Some(v) = lookup("CLAWCORE_MCP_TIMEOUT_MS") {
            self.mcp.request_timeout_ms = parse_override("CLAWCORE_MCP_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("CLAWCORE_MCP_RETRIES") {
            self.mcp.call_retries = parse_override("CLAWCORE_MCP_RETRIES", &v)?;
        }
        if let Some(v) = lookup("CLAWCORE_MCP_BACKOFF_MS") {
            self.mcp.call_backoff_ms = parse_override("CLAWCORE_MCP_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("CLAWCORE_SESSIONS_DIR") {
            self.sessions_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Resolved session storage directory.
    pub fn sessions_dir(&self) -> PathBuf {
        self.sessions_dir
            .clone()
            .unwrap_or_else(|| Self::dir().join("sessions"))
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ClawError::Config(format!("invalid value for {}: '{}'", key, value)))
}
