//! Client for one capability server.
//!
//! Requests are written as single JSON lines. A background reader task
//! parses each line the server prints and hands responses to the caller
//! waiting on the matching id. Responses may arrive in any order.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::protocol::*;
use super::retry::{retry_with_backoff, RetryPolicy};
use crate::config::{McpServerConfig, McpSettings};
use crate::error::{ClawError, Result};

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingMap = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value>>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes one request's entry from the pending table when dropped,
/// whichever way the request ends.
struct PendingEntry<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(&self.id);
    }
}

/// Per-call options for [`McpClient::call_tool`].
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    /// Total attempts (minimum 1).
    pub retries: u32,
    /// Deadline for each attempt; the client default when `None`.
    pub timeout: Option<Duration>,
    /// Base delay between attempts.
    pub backoff: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retries: policy.attempts,
            timeout: None,
            backoff: policy.backoff,
        }
    }
}

impl From<&McpSettings> for CallOptions {
    fn from(settings: &McpSettings) -> Self {
        Self {
            retries: settings.call_retries,
            timeout: None,
            backoff: Duration::from_millis(settings.call_backoff_ms),
        }
    }
}

/// Connection to one capability server.
///
/// Requests may be issued concurrently from many tasks; each waits only
/// for its own response.
pub struct McpClient {
    name: String,
    writer: Mutex<Option<BoxedWriter>>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl McpClient {
    /// Spawn the server process and complete the `initialize` handshake.
    ///
    /// The server's stderr is inherited so its diagnostics reach the
    /// terminal.
    ///
    /// # Errors
    ///
    /// Returns [`ClawError::Spawn`] when the command cannot be launched.
    /// A failed handshake stops the process and returns the request error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> clawcore::Result<()> {
    /// use clawcore::config::McpServerConfig;
    /// use clawcore::mcp::{McpClient, DEFAULT_REQUEST_TIMEOUT};
    ///
    /// let config = McpServerConfig::new("fs", "npx")
    ///     .with_args(["-y", "@modelcontextprotocol/server-filesystem", "."]);
    /// let client = McpClient::start(&config, DEFAULT_REQUEST_TIMEOUT).await?;
    /// let tools = client.list_tools().await?;
    /// println!("{} tools", tools.len());
    /// client.stop().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(config: &McpServerConfig, request_timeout: Duration) -> Result<Self> {
        info!(server = %config.name, command = %config.command, args = ?config.args, "Starting MCP server");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ClawError::Spawn {
            server: config.name.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClawError::NotStarted(config.name.clone()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClawError::NotStarted(config.name.clone()))?;

        let client = Self::connect(&config.name, stdout, stdin, request_timeout);
        *client.child.lock().await = Some(child);

        if let Err(e) = client.initialize().await {
            warn!(server = %config.name, error = %e, "MCP handshake failed");
            client.stop().await;
            return Err(e);
        }
        Ok(client)
    }

    /// Attach to an already running server over arbitrary byte streams.
    ///
    /// No handshake is performed; call [`McpClient::initialize`] when the
    /// peer expects one.
    pub fn connect<R, W>(name: &str, reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(read_loop(
            name.to_string(),
            BufReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&alive),
        ));

        Self {
            name: name.to_string(),
            writer: Mutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            reader: std::sync::Mutex::new(Some(handle)),
            child: Mutex::new(None),
            alive,
            request_timeout,
        }
    }

    /// Server name this client was started for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the connection is up (process alive, output not closed).
    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    /// `initialize` handshake followed by the `initialized` notification.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self
            .request_as(METHOD_INITIALIZE, Some(params), None)
            .await?;
        self.notify(METHOD_INITIALIZED).await?;

        if let Some(info) = &result.server_info {
            info!(server = %self.name, remote = %info.name, version = %info.version, "MCP server initialized");
        }
        Ok(result)
    }

    /// Tools the server advertises via `tools/list`.
    ///
    /// # Errors
    ///
    /// Fails when the request fails or the result does not have the
    /// expected shape.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let result: ToolsListResult = self.request_as(METHOD_TOOLS_LIST, None, None).await?;
        Ok(result.tools)
    }

    /// Resources the server advertises via `resources/list`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`McpClient::list_tools`].
    pub async fn list_resources(&self) -> Result<Vec<McpResource>> {
        let result: ResourcesListResult = self.request_as(METHOD_RESOURCES_LIST, None, None).await?;
        Ok(result.resources)
    }

    /// Contents of one resource.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let result: ReadResourceResult = self
            .request_as(METHOD_RESOURCES_READ, Some(json!({ "uri": uri })), None)
            .await?;
        Ok(result.contents)
    }

    /// `true` when the server answers `ping` in time. Errors are swallowed.
    pub async fn ping(&self) -> bool {
        match self.request(METHOD_PING, None, None).await {
            Ok(_) => true,
            Err(e) => {
                debug!(server = %self.name, error = %e, "Ping failed");
                false
            }
        }
    }

    /// Call a tool, retrying any failure with exponential backoff.
    ///
    /// Each attempt is a fresh request with its own id and deadline.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt once `options.retries`
    /// attempts have failed.
    pub async fn call_tool(&self, name: &str, args: &Value, options: CallOptions) -> Result<CallToolResult> {
        let policy = RetryPolicy::new(options.retries, options.backoff);
        let params = serde_json::to_value(CallToolParams {
            name,
            arguments: args,
        })?;

        retry_with_backoff(policy, |attempt| {
            let params = params.clone();
            async move {
                debug!(server = %self.name, tool = %name, attempt, "Calling MCP tool");
                self.request_as(METHOD_TOOLS_CALL, Some(params), options.timeout)
                    .await
            }
        })
        .await
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let value = self.request(method, params, timeout).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send one request and wait for its response or deadline.
    ///
    /// `timeout` overrides the client default for this request only. The
    /// pending entry is removed when the response arrives, when the
    /// deadline passes, or when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - [`ClawError::Rpc`] when the server answers with an error object
    /// - [`ClawError::Timeout`] when no response arrives in time
    /// - [`ClawError::Disconnected`] when the connection closes first
    /// - [`ClawError::NotStarted`] after [`McpClient::stop`]
    pub async fn request(&self, method: &str, params: Option<Value>, timeout: Option<Duration>) -> Result<Value> {
        let timeout = timeout.unwrap_or(self.request_timeout);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };

        self.write_line(&line).await?;
        trace!(server = %self.name, id, method, "Request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClawError::Disconnected(self.name.clone())),
            Err(_) => Err(ClawError::Timeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer
            .as_mut()
            .ok_or_else(|| ClawError::NotStarted(self.name.clone()))?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the streams, kill the process and reject everything pending.
    pub async fn stop(&self) {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = reader {
            handle.abort();
        }

        self.writer.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(server = %self.name, error = %e, "Kill failed (process already gone?)");
            }
        }

        self.alive.store(false, Ordering::SeqCst);
        reject_all(&self.pending, &self.name);
        info!(server = %self.name, "MCP server stopped");
    }
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

async fn read_loop<R>(name: String, reader: BufReader<R>, pending: PendingMap, alive: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch_line(&name, &line, &pending),
            Ok(None) => {
                debug!(server = %name, "MCP server closed its output");
                break;
            }
            Err(e) => {
                warn!(server = %name, error = %e, "Failed reading from MCP server");
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    reject_all(&pending, &name);
}

fn dispatch_line(name: &str, line: &str, pending: &PendingMap) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let message: IncomingMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            trace!(server = %name, error = %e, "Dropping malformed line");
            return;
        }
    };
    let Some(id) = message.response_id() else {
        trace!(server = %name, "Ignoring non-response message");
        return;
    };
    let Some(tx) = lock_pending(pending).remove(&id) else {
        trace!(server = %name, id, "Dropping response with no pending request");
        return;
    };

    let outcome = match message.error {
        Some(err) => Err(ClawError::Rpc {
            code: err.code,
            message: err.message,
        }),
        None => Ok(message.result.unwrap_or(Value::Null)),
    };
    // The caller may have timed out in the meantime.
    let _ = tx.send(outcome);
}

fn reject_all(pending: &PendingMap, name: &str) {
    let drained: Vec<_> = lock_pending(pending).drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(ClawError::Disconnected(name.to_string())));
    }
}
