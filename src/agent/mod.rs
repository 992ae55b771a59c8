//! Agent module - The bounded tool-calling loop
//!
//! The agent turns one user message into a final answer:
//!
//! - Appends the message to the session
//! - Builds context from the system prompt, tool schemas and history
//! - Calls the [`LLMProvider`](crate::providers::LLMProvider)
//! - Runs requested tool calls through the registry and feeds results back
//! - Stops on an answer without tool calls or at the iteration cap
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Session   │<───>│  AgentLoop  │────>│ LLMProvider │
//! │   Manager   │     │             │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │    Tool     │────>│ MCP servers │
//!                     │  Registry   │     │ (stdio)     │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clawcore::agent::AgentLoop;
//! use clawcore::config::Config;
//! use clawcore::session::SessionManager;
//!
//! async fn run_agent(provider: Arc<dyn clawcore::providers::LLMProvider>) -> clawcore::Result<()> {
//!     let config = Config::load()?;
//!     let tools = AgentLoop::default_tools(&config.agent);
//!     let sessions = SessionManager::with_path(config.sessions_dir())?;
//!     let agent = AgentLoop::new(config.agent, provider, tools, sessions);
//!
//!     let result = agent.process_message("cli:main", "List the files here").await;
//!     println!("{}", result.for_llm);
//!
//!     agent.shutdown().await;
//!     Ok(())
//! }
//! ```

mod context;
mod r#loop;
mod subagent;

pub use context::ContextBuilder;
pub use r#loop::{AgentLoop, NO_CONTENT_MESSAGE};
pub use subagent::SubagentManager;
