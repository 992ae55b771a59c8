//! Capability server definitions and the store that holds them.
//!
//! The agent core only reads these records. [`JsonServerStore`] keeps them in
//! a single JSON file next to the main config; [`MemoryServerStore`] is used
//! when nothing should touch disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::{ClawError, Result};

/// How to launch one capability server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique server name.
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            enabled: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Persistent store of capability server definitions.
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<McpServerConfig>>;
    async fn list_enabled(&self) -> Result<Vec<McpServerConfig>>;
    /// Insert or replace by name.
    async fn save(&self, server: McpServerConfig) -> Result<()>;
    /// Returns whether a record was removed.
    async fn delete(&self, name: &str) -> Result<bool>;
    async fn list_all(&self) -> Result<Vec<McpServerConfig>>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryServerStore {
    servers: RwLock<BTreeMap<String, McpServerConfig>>,
}

impl MemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_servers(servers: impl IntoIterator<Item = McpServerConfig>) -> Self {
        Self {
            servers: RwLock::new(servers.into_iter().map(|s| (s.name.clone(), s)).collect()),
        }
    }
}

#[async_trait]
impl ServerConfigStore for MemoryServerStore {
    async fn get(&self, name: &str) -> Result<Option<McpServerConfig>> {
        Ok(self.servers.read().await.get(name).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<McpServerConfig>> {
        Ok(self
            .servers
            .read()
            .await
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect())
    }

    async fn save(&self, server: McpServerConfig) -> Result<()> {
        self.servers.write().await.insert(server.name.clone(), server);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.servers.write().await.remove(name).is_some())
    }

    async fn list_all(&self) -> Result<Vec<McpServerConfig>> {
        Ok(self.servers.read().await.values().cloned().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServerFile {
    #[serde(default)]
    servers: Vec<McpServerConfig>,
}

/// File-backed store: one JSON document holding every server.
///
/// Each mutation rewrites the file atomically.
pub struct JsonServerStore {
    path: PathBuf,
    inner: MemoryServerStore,
}

impl JsonServerStore {
    /// Open the store at `path`, reading it if it exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let servers = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: ServerFile = serde_json::from_str(&content)
                .map_err(|e| ClawError::Config(format!("{}: {}", path.display(), e)))?;
            file.servers
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            inner: MemoryServerStore::with_servers(servers),
        })
    }

    async fn flush(&self) -> Result<()> {
        let file = ServerFile {
            servers: self.inner.list_all().await?,
        };
        crate::utils::write_atomic(&self.path, serde_json::to_vec_pretty(&file)?).await
    }
}

#[async_trait]
impl ServerConfigStore for JsonServerStore {
    async fn get(&self, name: &str) -> Result<Option<McpServerConfig>> {
        self.inner.get(name).await
    }

    async fn list_enabled(&self) -> Result<Vec<McpServerConfig>> {
        self.inner.list_enabled().await
    }

    async fn save(&self, server: McpServerConfig) -> Result<()> {
        self.inner.save(server).await?;
        self.flush().await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.inner.delete(name).await?;
        if removed {
            self.flush().await?;
        }
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<McpServerConfig>> {
        self.inner.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_lists_only_enabled() {
        let store = MemoryServerStore::with_servers([
            McpServerConfig::new("fs", "mcp-fs"),
            McpServerConfig::new("git", "mcp-git").disabled(),
        ]);

        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "fs");
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_save_replaces_by_name() {
        let store = MemoryServerStore::new();
        store.save(McpServerConfig::new("fs", "old")).await.unwrap();
        store.save(McpServerConfig::new("fs", "new")).await.unwrap();

        let fs = store.get("fs").await.unwrap().unwrap();
        assert_eq!(fs.command, "new");
        assert!(store.delete("fs").await.unwrap());
        assert!(!store.delete("fs").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mcp_servers.json");

        {
            let store = JsonServerStore::open(path.clone()).unwrap();
            store
                .save(
                    McpServerConfig::new("fs", "npx")
                        .with_args(["-y", "@modelcontextprotocol/server-filesystem"])
                        .with_env("ROOT", "/work"),
                )
                .await
                .unwrap();
        }

        let store = JsonServerStore::open(path).unwrap();
        let fs = store.get("fs").await.unwrap().unwrap();
        assert_eq!(fs.args.len(), 2);
        assert_eq!(fs.env.get("ROOT").map(String::as_str), Some("/work"));
        assert!(fs.enabled);
    }

    #[test]
    fn test_enabled_defaults_to_true() {
        let config: McpServerConfig =
            serde_json::from_str(r#"{"name": "x", "command": "run-x"}"#).unwrap();
        assert!(config.enabled);
        assert!(config.args.is_empty());
    }
}
