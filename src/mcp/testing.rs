//! In-process fake capability server for tests.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use tokio::task::JoinHandle;

use super::client::McpClient;
use super::protocol::*;

/// How the fake answers one request.
pub(crate) enum Reply {
    Result(Value),
    Error(i64, String),
    /// Answer with this value as the `error` member, verbatim.
    RawError(Value),
    /// Answer after a delay, without blocking later requests.
    Delayed(Duration, Value),
    /// Emit these raw lines first, then the result.
    Noise(Vec<String>, Value),
    /// Never answer.
    Silent,
}

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;
type SharedWriter = Arc<tokio::sync::Mutex<WriteHalf<DuplexStream>>>;
type Log = Arc<Mutex<Vec<(Option<u64>, String)>>>;

pub(crate) struct FakeServer {
    handler: Handler,
}

impl FakeServer {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// A well-behaved server with two tools and one resource.
    pub fn standard() -> Self {
        Self::new(|method, params| match method {
            METHOD_INITIALIZE => Reply::Result(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake", "version": "1.0"}
            })),
            METHOD_TOOLS_LIST => Reply::Result(json!({
                "tools": [
                    {
                        "name": "echo",
                        "description": "Echo text",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"text": {"type": "string"}},
                            "required": ["text"]
                        }
                    },
                    {"name": "now", "description": "Current time"}
                ]
            })),
            METHOD_TOOLS_CALL => {
                let text = params["arguments"]["text"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("called {}", params["name"].as_str().unwrap_or("?")));
                Reply::Result(json!({"content": [{"type": "text", "text": text}], "isError": false}))
            }
            METHOD_RESOURCES_LIST => Reply::Result(json!({
                "resources": [{"uri": "file:///readme.md", "name": "readme", "mimeType": "text/markdown"}]
            })),
            METHOD_RESOURCES_READ => {
                let uri = params["uri"].as_str().unwrap_or_default();
                Reply::Result(json!({
                    "contents": [{"uri": uri, "text": format!("contents of {}", uri)}]
                }))
            }
            METHOD_PING => Reply::Result(json!({})),
            _ => Reply::Error(-32601, format!("Method not found: {}", method)),
        })
    }

    /// Serve on one end of a duplex pipe and attach a client to the other.
    pub fn connect(self, name: &str) -> (McpClient, FakeServerHandle) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let client = McpClient::connect(name, client_read, client_write, Duration::from_secs(5));
        (client, self.spawn(server_io))
    }

    pub fn spawn(self, io: DuplexStream) -> FakeServerHandle {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(self.handler, io, Arc::clone(&log)));
        FakeServerHandle { log, task }
    }
}

pub(crate) struct FakeServerHandle {
    log: Log,
    task: JoinHandle<()>,
}

impl FakeServerHandle {
    /// Every method received, notifications included.
    pub fn methods(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Ids of every request received, in arrival order.
    pub fn ids(&self) -> Vec<u64> {
        self.log.lock().unwrap().iter().filter_map(|(id, _)| *id).collect()
    }

    /// Drop the server side so the client sees end of input.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for FakeServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(handler: Handler, io: DuplexStream, log: Log) {
    let (read, write) = tokio::io::split(io);
    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(write));
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let method = message["method"].as_str().unwrap_or_default().to_string();
        let id = message.get("id").and_then(Value::as_u64);
        log.lock().unwrap().push((id, method.clone()));

        let Some(id) = id else { continue };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        match handler(&method, &params) {
            Reply::Silent => {}
            Reply::Result(result) => write_line(&writer, &response(id, result)).await,
            Reply::Error(code, message) => {
                let line = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": code, "message": message}
                })
                .to_string();
                write_line(&writer, &line).await;
            }
            Reply::RawError(error) => {
                let line = json!({"jsonrpc": "2.0", "id": id, "error": error}).to_string();
                write_line(&writer, &line).await;
            }
            Reply::Noise(noise, result) => {
                for line in noise {
                    write_line(&writer, &line).await;
                }
                write_line(&writer, &response(id, result)).await;
            }
            Reply::Delayed(delay, result) => {
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    write_line(&writer, &response(id, result)).await;
                });
            }
        }
    }
}

fn response(id: u64, result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

async fn write_line(writer: &SharedWriter, line: &str) {
    let mut writer = writer.lock().await;
    let _ = writer.write_all(line.as_bytes()).await;
    let _ = writer.write_all(b"\n").await;
    let _ = writer.flush().await;
}
