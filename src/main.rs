//! ClawCore CLI
//!
//! Manages capability server definitions, calls their tools directly and
//! inspects stored sessions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clawcore::config::{Config, JsonServerStore, McpServerConfig, ServerConfigStore};
use clawcore::mcp::{CallOptions, McpToolProvider, ProcessClientFactory, ServerSupervisor};
use clawcore::session::SessionManager;

#[derive(Parser)]
#[command(name = "clawcore")]
#[command(about = "Execution core for a tool-calling coding agent")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage capability server definitions
    Servers {
        #[command(subcommand)]
        action: ServersAction,
    },
    /// List tools across every enabled server
    Tools,
    /// Call a tool on one server
    Call {
        server: String,
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Total attempts
        #[arg(long)]
        retries: Option<u32>,
        /// Per-attempt timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Check that a server answers
    Ping { server: String },
    /// List a server's resources, or read one
    Resources {
        server: String,
        /// Resource URI to read
        #[arg(long)]
        read: Option<String>,
    },
    /// Inspect stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum ServersAction {
    /// Show every configured server
    List,
    /// Add or replace a server
    Add {
        name: String,
        command: String,
        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Environment variable as KEY=VALUE (repeatable)
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        /// Store the server without enabling it
        #[arg(long)]
        disabled: bool,
    },
    /// Remove a server
    Remove { name: String },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List session keys
    List,
    /// Print a session's messages
    Show { key: String },
    /// Keep only the last N messages of a session
    Truncate { key: String, keep: usize },
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clawcore=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = Config::load().context("failed to load configuration")?;
    debug!(dir = %Config::dir().display(), "Configuration loaded");

    match cli.command {
        Commands::Servers { action } => servers_command(action).await,
        Commands::Sessions { action } => sessions_command(&config, action).await,
        command => mcp_command(&config, command).await,
    }
}

fn open_store() -> Result<Arc<JsonServerStore>> {
    let path = Config::servers_path();
    let store = JsonServerStore::open(path.clone())
        .with_context(|| format!("failed to open server store {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn servers_command(action: ServersAction) -> Result<()> {
    let store = open_store()?;
    match action {
        ServersAction::List => {
            let servers = store.list_all().await?;
            if servers.is_empty() {
                println!("No servers configured.");
            }
            for server in servers {
                let state = if server.enabled { "enabled" } else { "disabled" };
                println!("{} ({}): {} {}", server.name, state, server.command, server.args.join(" "));
            }
        }
        ServersAction::Add {
            name,
            command,
            args,
            env,
            disabled,
        } => {
            let mut server = McpServerConfig::new(name.as_str(), command).with_args(args);
            for (key, value) in env {
                server = server.with_env(key, value);
            }
            if disabled {
                server = server.disabled();
            }
            store.save(server).await?;
            println!("Saved server '{}'.", name);
        }
        ServersAction::Remove { name } => {
            if !store.delete(&name).await? {
                bail!("no server named '{}'", name);
            }
            println!("Removed server '{}'.", name);
        }
    }
    Ok(())
}

async fn mcp_command(config: &Config, command: Commands) -> Result<()> {
    let store = open_store()?;
    let supervisor = Arc::new(ServerSupervisor::new(Arc::new(ProcessClientFactory::new(
        config.mcp.request_timeout(),
    ))));
    let mut options = CallOptions::from(&config.mcp);
    if let Commands::Call {
        retries, timeout_ms, ..
    } = &command
    {
        if let Some(retries) = retries {
            options.retries = *retries;
        }
        options.timeout = timeout_ms.map(Duration::from_millis);
    }
    let provider = McpToolProvider::new(store, supervisor.clone()).with_call_options(options);

    let result = run_mcp_command(&provider, command).await;
    supervisor.stop_all().await;
    result
}

async fn run_mcp_command(provider: &McpToolProvider, command: Commands) -> Result<()> {
    match command {
        Commands::Tools => {
            let tools = provider.get_available_tools().await?;
            if tools.is_empty() {
                println!("No tools available.");
            }
            for info in tools {
                let description = info.tool.description.as_deref().unwrap_or("");
                println!("{}/{}: {}", info.mcp_source, info.tool.name, description);
            }
        }
        Commands::Call {
            server, tool, args, ..
        } => {
            let args: Value = serde_json::from_str(&args).context("--args must be valid JSON")?;
            if !args.is_object() {
                bail!("--args must be a JSON object");
            }
            let result = provider
                .execute_tool(&clawcore::mcp::McpToolRequest {
                    mcp_source: server,
                    name: tool,
                    args,
                })
                .await?;
            println!("{}", result.text());
            if result.is_error {
                bail!("tool reported an error");
            }
        }
        Commands::Ping { server } => {
            let client = provider.client(&server).await?;
            if client.ping().await {
                println!("{} is alive", server);
            } else {
                bail!("{} did not answer", server);
            }
        }
        Commands::Resources { server, read } => match read {
            Some(uri) => {
                for contents in provider.read_resource(&server, &uri).await? {
                    match contents.text {
                        Some(text) => println!("{}", text),
                        None => println!("[binary resource: {}]", contents.uri),
                    }
                }
            }
            None => {
                for resource in provider.list_resources(&server).await? {
                    println!("{} {}", resource.uri, resource.name.unwrap_or_default());
                }
            }
        },
        Commands::Servers { .. } | Commands::Sessions { .. } => {}
    }
    Ok(())
}

async fn sessions_command(config: &Config, action: SessionsAction) -> Result<()> {
    let dir = config.sessions_dir();
    let manager = SessionManager::with_path(dir.clone())
        .with_context(|| format!("failed to open sessions in {}", dir.display()))?;

    match action {
        SessionsAction::List => {
            for key in manager.list().await {
                println!("{}", key);
            }
        }
        SessionsAction::Show { key } => {
            let Some(session) = manager.get(&key).await else {
                bail!("no session '{}'", key);
            };
            if let Some(summary) = &session.summary {
                println!("Summary: {}\n", summary);
            }
            for message in &session.messages {
                let role = serde_json::to_value(message.role)?;
                let role = role.as_str().unwrap_or("?");
                match &message.name {
                    Some(name) => println!("[{}:{}] {}", role, name, message.content),
                    None => println!("[{}] {}", role, message.content),
                }
            }
        }
        SessionsAction::Truncate { key, keep } => {
            if !manager.exists(&key).await {
                bail!("no session '{}'", key);
            }
            manager.truncate_history(&key, keep).await;
            manager.save(&key).await?;
            println!("Kept the last {} messages of '{}'.", keep, key);
        }
    }
    Ok(())
}
