//! JSON-RPC client for a language server running as a child process.
//!
//! Requests are correlated by numeric id. A background reader task routes
//! responses to the waiting callers, answers server-initiated requests with
//! `null`, and logs notifications. When the connection breaks, every pending
//! and every later request fails with [`LspError::Transport`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::transport::{read_message, write_message};
use super::types::*;
use super::uri::path_to_uri;
use super::{LanguageServer, LspError};
use crate::config::LspConfig;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type Responder = oneshot::Sender<Result<Value, LspError>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Default)]
struct PendingRequests {
    /// Set once the connection is gone; the reason is handed to every caller.
    closed: Option<String>,
    waiting: HashMap<u64, Responder>,
}

struct Shared {
    writer: tokio::sync::Mutex<BoxedWriter>,
    pending: Mutex<PendingRequests>,
}

impl Shared {
    /// Mark the connection broken and fail everything still waiting.
    fn close(&self, reason: String) {
        let mut pending = self.pending.lock();
        if pending.closed.is_none() {
            warn!(reason = %reason, "language server connection closed");
            pending.closed = Some(reason.clone());
        }
        for (_, responder) in pending.waiting.drain() {
            let _ = responder.send(Err(LspError::Transport(reason.clone())));
        }
    }

    async fn send<T: Serialize + Sync>(&self, message: &T) -> Result<(), LspError> {
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, message).await
    }
}

/// Client side of one language server connection.
pub struct LspClient {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl LspClient {
    /// Launch the configured server with `root` as working directory.
    pub fn spawn(config: &LspConfig, root: &Path) -> Result<Self, LspError> {
        info!(command = %config.command, args = ?config.args, "starting language server");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LspError::Transport(format!("failed to start {}: {}", config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::Transport("language server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::Transport("language server stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let client = Self::from_io(stdout, stdin);
        *client.child.lock() = Some(child);
        Ok(client)
    }

    /// Speak the protocol over arbitrary streams. Must be called inside a
    /// tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: Mutex::new(PendingRequests::default()),
        });
        let reader = tokio::spawn(read_loop(BufReader::new(reader), Arc::clone(&shared)));

        Self {
            shared,
            next_id: AtomicU64::new(1),
            reader,
            child: Mutex::new(None),
        }
    }

    /// True once the connection has failed or been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.pending.lock().closed.is_some()
    }

    /// Send a request and wait for its result.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        cancel: &CancellationToken,
    ) -> Result<R, LspError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        if cancel.is_cancelled() {
            return Err(LspError::Cancelled);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if let Some(reason) = &pending.closed {
                return Err(LspError::Transport(reason.clone()));
            }
            pending.waiting.insert(id, tx);
        }

        trace!(id, method, "sending request");
        let message = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        if let Err(e) = self.shared.send(&message).await {
            self.shared.close(e.to_string());
            return Err(e);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                self.shared.pending.lock().waiting.remove(&id);
                let _ = self.notify("$/cancelRequest", json!({ "id": id })).await;
                return Err(LspError::Cancelled);
            }
            outcome = rx => outcome,
        };

        let value = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(LspError::Transport(
                    "response channel dropped".to_string(),
                ))
            }
        };

        serde_json::from_value(value).map_err(|e| LspError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send a notification; no response is expected.
    pub async fn notify<P>(&self, method: &str, params: P) -> Result<(), LspError>
    where
        P: Serialize + Send + Sync,
    {
        let closed = self.shared.pending.lock().closed.clone();
        if let Some(reason) = closed {
            return Err(LspError::Transport(reason));
        }
        let message = JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        };
        if let Err(e) = self.shared.send(&message).await {
            self.shared.close(e.to_string());
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl LanguageServer for LspClient {
    async fn initialize(
        &self,
        root: &Path,
        process_id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), LspError> {
        let root_uri = path_to_uri(root);
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());

        let params = InitializeParams {
            process_id,
            root_uri: root_uri.clone(),
            root_path: root.display().to_string(),
            capabilities: json!({
                "textDocument": {
                    "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                    "references": {}
                },
                "window": { "workDoneProgress": false }
            }),
            workspace_folders: vec![WorkspaceFolder {
                uri: root_uri,
                name,
            }],
        };

        let result: Value = self.request("initialize", params, cancel).await?;
        debug!(server = %server_name(&result), "language server initialized");
        self.notify("initialized", json!({})).await
    }

    async fn did_open(&self, uri: &str, language_id: &str, text: &str) -> Result<(), LspError> {
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri,
                language_id,
                version: 1,
                text,
            },
        };
        self.notify("textDocument/didOpen", params).await
    }

    async fn document_symbols(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentSymbol>, LspError> {
        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri },
        };
        let response: Option<DocumentSymbolResponse> = self
            .request("textDocument/documentSymbol", params, cancel)
            .await?;
        Ok(response.map(DocumentSymbolResponse::into_nested).unwrap_or_default())
    }

    async fn references(
        &self,
        uri: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>, LspError> {
        let params = ReferenceParams {
            text_document: TextDocumentIdentifier { uri },
            position,
            context: ReferenceContext {
                include_declaration: false,
            },
        };
        let locations: Option<Vec<Location>> = self
            .request("textDocument/references", params, cancel)
            .await?;
        Ok(locations.unwrap_or_default())
    }

    async fn shutdown(&self) -> Result<(), LspError> {
        if self.is_closed() {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let request = self.request::<_, Value>("shutdown", Value::Null, &cancel);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, request).await {
            Ok(result) => {
                result?;
            }
            Err(_) => warn!("language server did not acknowledge shutdown"),
        }
        let exit = self.notify("exit", Value::Null).await;
        self.shared.close("client shut down".to_string());

        let child = self.child.lock().take();
        if let Some(mut child) = child {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await.is_err() {
                let _ = child.kill().await;
            }
        }
        exit
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let reason = loop {
        let body = match read_message(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => break "language server closed the connection".to_string(),
            Err(e) => break e.to_string(),
        };

        let message: IncomingMessage = match serde_json::from_slice(&body) {
            Ok(message) => message,
            Err(e) => break format!("malformed message from language server: {}", e),
        };

        match message.classify() {
            Some(ServerMessage::Response { id, outcome }) => {
                let responder = shared.pending.lock().waiting.remove(&id);
                match responder {
                    Some(responder) => {
                        let _ = responder.send(outcome.map_err(|e| LspError::Response {
                            code: e.code,
                            message: e.message,
                        }));
                    }
                    None => trace!(id, "response for unknown or cancelled request"),
                }
            }
            Some(ServerMessage::Request { id, method }) => {
                debug!(method = %method, "answering server request with null");
                let response = JsonRpcResponse {
                    jsonrpc: "2.0",
                    id,
                    result: Value::Null,
                };
                if let Err(e) = shared.send(&response).await {
                    break e.to_string();
                }
            }
            Some(ServerMessage::Notification { method, params }) => {
                log_notification(&method, &params)
            }
            None => warn!("ignoring message that is neither request, response nor notification"),
        }
    };

    shared.close(reason);
}

/// `serverInfo.name` from an initialize result.
fn server_name(result: &Value) -> &str {
    result
        .pointer("/serverInfo/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

/// Server notifications are informational; they never touch graph state.
fn log_notification(method: &str, params: &Value) {
    match method {
        "window/logMessage" | "window/showMessage" => {
            let message = params.get("message").and_then(Value::as_str).unwrap_or("");
            debug!(message = %message, "language server message");
        }
        "textDocument/publishDiagnostics" => {
            let uri = params.get("uri").and_then(Value::as_str).unwrap_or("");
            trace!(uri = %uri, "diagnostics received");
        }
        other => trace!(method = %other, "ignoring notification"),
    }
}

async fn forward_stderr<R: AsyncRead + Unpin>(stderr: R) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "archlens::lsp::stderr", "{}", line);
    }
}
