//! Session module - Session and conversation state management
//!
//! This module provides session management for ClawCore, including:
//! - An in-memory cache of every known session
//! - One JSON file per session, written atomically
//! - History truncation and conversation summaries
//!
//! # Example
//!
//! ```
//! use clawcore::session::{SessionManager, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new_memory();
//!
//!     // Get or create a session
//!     let session = manager.get_or_create("cli:main").await;
//!     assert!(session.is_empty());
//!
//!     // Add messages
//!     manager.add_message("cli:main", Message::user("Hello!")).await;
//!     manager.add_message("cli:main", Message::assistant("Hi there!")).await;
//!
//!     // Save the session
//!     manager.save("cli:main").await.unwrap();
//! }
//! ```

pub mod types;

pub use types::{Message, Role, Session, ToolCall};

use crate::config::Config;
use crate::error::{ClawError, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

type KeyLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Session manager for storing and retrieving conversation sessions.
///
/// The `SessionManager` keeps every session in memory and, when created
/// with a storage directory, mirrors each one to `<dir>/<sanitized key>.json`.
/// Sessions are identified by unique keys (e.g., "cli:main").
///
/// # Thread Safety
///
/// The manager uses `Arc<RwLock>` internally, making it safe to clone
/// and share across async tasks. [`SessionManager::lock`] hands out a
/// per-key guard for callers that load, mutate and save a session as one
/// unit; `save` itself is serialized per key.
///
/// # Persistence
///
/// All well-formed files in the storage directory are loaded when the
/// manager is built; corrupt files are skipped with a warning. After that
/// [`SessionManager::get_or_create`] is the only way a session enters the
/// cache.
pub struct SessionManager {
    /// In-memory cache of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Optional directory for file-based persistence
    storage_path: Option<PathBuf>,
    /// Guards handed to callers doing load-mutate-save
    locks: KeyLocks,
    /// Serializes file writes for one key
    write_locks: KeyLocks,
}

impl SessionManager {
    /// Create a session manager persisting to the configured sessions
    /// directory (`~/.clawcore/sessions` by default).
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_path(Config::dir().join("sessions"))
    }

    /// Create an in-memory session manager without persistence.
    ///
    /// # Example
    /// ```
    /// use clawcore::session::SessionManager;
    ///
    /// let manager = SessionManager::new_memory();
    /// ```
    pub fn new_memory() -> Self {
        Self::from_parts(HashMap::new(), None)
    }

    /// Create a session manager over `path`, loading every session file
    /// already stored there.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    /// Individual unreadable or corrupt files are skipped.
    ///
    /// # Example
    /// ```no_run
    /// use clawcore::session::SessionManager;
    /// use std::path::PathBuf;
    ///
    /// let manager = SessionManager::with_path(PathBuf::from("/tmp/sessions")).unwrap();
    /// ```
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        let sessions = Self::load_dir(&path)?;
        debug!(dir = %path.display(), count = sessions.len(), "Loaded sessions");
        Ok(Self::from_parts(sessions, Some(path)))
    }

    fn from_parts(sessions: HashMap<String, Session>, storage_path: Option<PathBuf>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            storage_path,
            locks: Arc::new(DashMap::new()),
            write_locks: Arc::new(DashMap::new()),
        }
    }

    fn load_dir(dir: &Path) -> Result<HashMap<String, Session>> {
        let mut sessions = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(ClawError::from)
                .and_then(|content| serde_json::from_str::<Session>(&content).map_err(ClawError::from));
            match parsed {
                Ok(session) => {
                    sessions.insert(session.key.clone(), session);
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }
        Ok(sessions)
    }

    /// Get an existing session or create a new empty one.
    ///
    /// # Example
    /// ```
    /// use clawcore::session::SessionManager;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let manager = SessionManager::new_memory();
    ///     let session = manager.get_or_create("test-session").await;
    ///     assert_eq!(session.key, "test-session");
    /// }
    /// ```
    pub async fn get_or_create(&self, key: &str) -> Session {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .clone()
    }

    /// Get a cached session by key without creating it.
    pub async fn get(&self, key: &str) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Append a message to a session, creating the session if needed.
    pub async fn add_message(&self, key: &str, message: Message) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .add_message(message);
    }

    /// Keep only the last `keep_last` messages of a session.
    ///
    /// Unknown keys are ignored.
    pub async fn truncate_history(&self, key: &str, keep_last: usize) {
        if let Some(session) = self.sessions.write().await.get_mut(key) {
            session.truncate_history(keep_last);
        }
    }

    /// Replace the session's summary.
    pub async fn set_summary(&self, key: &str, summary: Option<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(key) {
            session.summary = summary;
            session.updated = chrono::Utc::now();
        }
    }

    /// Put a whole session back into the cache (does not touch disk).
    pub async fn update(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.key.clone(), session);
    }

    /// Write a cached session to disk (no-op without persistence).
    ///
    /// The file is written to a temporary path in the same directory and
    /// renamed over the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not cached or the write fails.
    pub async fn save(&self, key: &str) -> Result<()> {
        let Some(storage_path) = self.storage_path.as_ref() else {
            return Ok(());
        };

        let write_lock = Self::key_lock(&self.write_locks, key);
        let _guard = write_lock.lock().await;

        let content = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(key)
                .ok_or_else(|| ClawError::Session(format!("unknown session '{}'", key)))?;
            serde_json::to_vec_pretty(session)?
        };

        let file_path = Self::file_path(storage_path, key);
        crate::utils::write_atomic(&file_path, content).await?;
        debug!(session = %key, file = %file_path.display(), "Session saved");
        Ok(())
    }

    /// Delete a session from both memory and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if deleting from disk fails.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.sessions.write().await.remove(key);

        if let Some(ref storage_path) = self.storage_path {
            let file_path = Self::file_path(storage_path, key);
            if file_path.exists() {
                tokio::fs::remove_file(&file_path).await?;
            }
        }
        Ok(())
    }

    /// All session keys, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    /// Get the number of sessions in memory.
    pub async fn cache_size(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Acquire the per-key guard. Hold it across load-mutate-save so two
    /// loops working on the same session do not interleave.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        Self::key_lock(&self.locks, key).lock_owned().await
    }

    fn key_lock(locks: &KeyLocks, key: &str) -> Arc<Mutex<()>> {
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn file_path(storage_path: &Path, key: &str) -> PathBuf {
        storage_path.join(format!("{}.json", Self::sanitize_key(key)))
    }

    /// Sanitize a session key for use as a filename.
    ///
    /// Every character outside `[A-Za-z0-9_-]` becomes an underscore.
    pub(crate) fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            storage_path: self.storage_path.clone(),
            locks: Arc::clone(&self.locks),
            write_locks: Arc::clone(&self.write_locks),
        }
    }
}

impl Default for SessionManager {
    /// Creates an in-memory session manager.
    ///
    /// Use `SessionManager::new()` for file-based persistence.
    fn default() -> Self {
        Self::new_memory()
    }
}
