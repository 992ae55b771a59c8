//! Lifecycle of many capability server clients.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::client::{McpClient, DEFAULT_REQUEST_TIMEOUT};
use crate::config::McpServerConfig;
use crate::error::Result;

/// Creates a connected, initialized client for a server definition.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, config: &McpServerConfig) -> Result<McpClient>;
}

/// Spawns the configured command as a subprocess.
#[derive(Debug, Clone)]
pub struct ProcessClientFactory {
    request_timeout: Duration,
}

impl ProcessClientFactory {
    /// Clients created by this factory use `request_timeout` as their
    /// default deadline.
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for ProcessClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl ClientFactory for ProcessClientFactory {
    async fn connect(&self, config: &McpServerConfig) -> Result<McpClient> {
        McpClient::start(config, self.request_timeout).await
    }
}

/// A registered server and whether its connection is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub name: String,
    pub running: bool,
}

/// Owns the running clients, at most one per server name.
///
/// Starting a name that is already registered stops the old client first.
/// Operations on the same name are serialized; different names proceed
/// independently.
pub struct ServerSupervisor {
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ServerSupervisor {
    /// An empty supervisor. Clients are created through `factory`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use clawcore::mcp::{ProcessClientFactory, ServerSupervisor};
    ///
    /// let supervisor = ServerSupervisor::new(Arc::new(ProcessClientFactory::default()));
    /// ```
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
            name_locks: DashMap::new(),
        }
    }

    fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.name_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start (or restart) the server described by `config`.
    ///
    /// Any client already registered under the name is stopped before the
    /// new one is created.
    ///
    /// # Errors
    ///
    /// Returns the factory's error when the server cannot be spawned or
    /// fails its handshake. Nothing is registered in that case.
    pub async fn start(&self, config: &McpServerConfig) -> Result<Arc<McpClient>> {
        let lock = self.name_lock(&config.name);
        let _guard = lock.lock().await;
        self.start_locked(config).await
    }

    /// Return the running client for `config.name`, starting it if it is
    /// absent or its connection has died.
    pub async fn ensure_running(&self, config: &McpServerConfig) -> Result<Arc<McpClient>> {
        let lock = self.name_lock(&config.name);
        let _guard = lock.lock().await;
        if let Some(client) = self.get(&config.name).await {
            if client.is_running() {
                return Ok(client);
            }
            debug!(server = %config.name, "Registered client is dead, restarting");
        }
        self.start_locked(config).await
    }

    async fn start_locked(&self, config: &McpServerConfig) -> Result<Arc<McpClient>> {
        let previous = self.clients.write().await.remove(&config.name);
        if let Some(previous) = previous {
            info!(server = %config.name, "Replacing running MCP server");
            previous.stop().await;
        }

        let client = Arc::new(self.factory.connect(config).await?);
        self.clients
            .write()
            .await
            .insert(config.name.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// Stop and forget one server. Unknown names are ignored.
    pub async fn stop(&self, name: &str) {
        let lock = self.name_lock(name);
        let _guard = lock.lock().await;
        let client = self.clients.write().await.remove(name);
        if let Some(client) = client {
            client.stop().await;
        }
    }

    /// Stop every server concurrently and wait for all of them.
    ///
    /// Each name is stopped under its lock, so a start already in progress
    /// completes first and its client is then stopped too.
    pub async fn stop_all(&self) {
        let mut names: Vec<String> = self.name_locks.iter().map(|entry| entry.key().clone()).collect();
        for name in self.clients.read().await.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        if names.is_empty() {
            return;
        }
        info!(count = names.len(), "Stopping all MCP servers");
        futures::future::join_all(names.iter().map(|name| self.stop(name))).await;
    }

    /// The registered client for `name`, alive or not.
    pub async fn get(&self, name: &str) -> Option<Arc<McpClient>> {
        self.clients.read().await.get(name).cloned()
    }

    /// Registered and alive.
    pub async fn is_running(&self, name: &str) -> bool {
        self.clients
            .read()
            .await
            .get(name)
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    /// Every registered server with its live flag, sorted by name.
    pub async fn get_running_servers(&self) -> Vec<ServerStatus> {
        let mut servers: Vec<ServerStatus> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(name, client)| ServerStatus {
                name: name.clone(),
                running: client.is_running(),
            })
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }
}
