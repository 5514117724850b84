//! Client proxy for the tool server.
//!
//! [`McpClient`] owns one transport session. A background task owns the
//! read half and routes every response to the caller waiting on its id;
//! callers write requests through a shared writer. Wire ids come from a
//! session-wide counter and are never reused, so a response that arrives
//! after its caller gave up cannot be mistaken for the answer to a newer
//! call: it finds no waiter and is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Child;
use tokio::sync::{Mutex, OnceCell, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::transport::connection::{DynReader, DynWriter};
use super::transport::message::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, PeerInfo, RpcId,
    error_codes,
};
use super::transport::{
    Connection, Endpoint, FrameReader, FrameWriter, JsonRpcMessage, TransportError,
    TransportResult,
};
use crate::domains::agent::ToolInvoker;
use crate::domains::tools::{CapabilityManifest, ToolCallRequest, ToolCallResult, ToolErrorKind};

/// How long `shutdown` waits for the server to exit on its own.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Calls waiting for a response, keyed by wire id.
#[derive(Default)]
struct PendingCalls {
    waiters: HashMap<i64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once the session can no longer deliver responses.
    closed: Option<String>,
}

type SharedPending = Arc<StdMutex<PendingCalls>>;

fn lock_pending(pending: &SharedPending) -> MutexGuard<'_, PendingCalls> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Client side of one tool server session.
pub struct McpClient {
    writer: Mutex<Option<FrameWriter<DynWriter>>>,
    pending: SharedPending,
    next_id: AtomicI64,
    manifest: OnceCell<Arc<CapabilityManifest>>,
    server_info: OnceLock<PeerInfo>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
    call_timeout: Duration,
}

impl McpClient {
    /// Open `endpoint` and perform the handshake.
    pub async fn connect(endpoint: &Endpoint, call_timeout: Duration) -> TransportResult<Self> {
        let connection = Connection::open(endpoint).await?;
        Self::start(connection, call_timeout).await
    }

    /// Start a session over an already open connection.
    ///
    /// Spawns the reader task, sends `initialize` and, once the server has
    /// answered, `notifications/initialized`.
    pub async fn start(connection: Connection, call_timeout: Duration) -> TransportResult<Self> {
        let Connection {
            reader,
            writer,
            child,
        } = connection;

        let pending: SharedPending = Arc::default();
        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&pending)));

        let client = Self {
            writer: Mutex::new(Some(writer)),
            pending,
            next_id: AtomicI64::new(1),
            manifest: OnceCell::new(),
            server_info: OnceLock::new(),
            reader_task: StdMutex::new(Some(reader_task)),
            child: Mutex::new(child),
            call_timeout,
        };

        if let Err(e) = client.handshake().await {
            client.shutdown().await.ok();
            return Err(e);
        }

        Ok(client)
    }

    async fn handshake(&self) -> TransportResult<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info: PeerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        };

        let result = self
            .control("initialize", Some(serde_json::to_value(&params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| TransportError::protocol(format!("invalid initialize result: {e}")))?;

        if result.protocol_version != PROTOCOL_VERSION {
            warn!(
                "Server speaks protocol {}, expected {}",
                result.protocol_version, PROTOCOL_VERSION
            );
        }
        info!(
            "Connected to {} {}",
            result.server_info.name,
            result.server_info.version.as_deref().unwrap_or("")
        );
        let _ = self.server_info.set(result.server_info);

        self.notify("notifications/initialized", None).await
    }

    /// Server identification from the handshake.
    pub fn server_info(&self) -> Option<&PeerInfo> {
        self.server_info.get()
    }

    /// The default per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Fetch the capability manifest, once per session.
    pub async fn discover(&self) -> TransportResult<Arc<CapabilityManifest>> {
        self.manifest
            .get_or_try_init(|| async {
                let result = self.control("tools/list", None).await?;
                let list: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                    TransportError::protocol(format!("invalid tools/list result: {e}"))
                })?;
                info!("Discovered {} tools", list.tools.len());
                Ok::<_, TransportError>(Arc::new(CapabilityManifest::new(list.tools)))
            })
            .await
            .cloned()
    }

    /// Check that the server is alive.
    pub async fn ping(&self) -> TransportResult<()> {
        self.control("ping", None).await.map(|_| ())
    }

    /// Invoke a tool and wait at most `timeout` for its result.
    ///
    /// Call-level failures (unknown tool, invalid arguments, execution
    /// error, timeout) come back as a failed [`ToolCallResult`]; only a
    /// broken session is an `Err`.
    #[instrument(skip_all, fields(call_id = %request.id, tool = %request.name))]
    pub async fn invoke(
        &self,
        request: &ToolCallRequest,
        timeout: Duration,
    ) -> TransportResult<ToolCallResult> {
        let params = CallToolParams {
            name: request.name.clone(),
            arguments: request.arguments.clone(),
        };

        let Some(response) = self
            .request("tools/call", Some(serde_json::to_value(&params)?), timeout)
            .await?
        else {
            warn!("Tool call timed out after {:?}", timeout);
            return Ok(ToolCallResult::failure(
                request,
                ToolErrorKind::Timeout,
                format!("tool '{}' did not answer within {:?}", request.name, timeout),
            ));
        };

        if let Some(err) = response.error {
            let kind = match err.code {
                error_codes::TOOL_NOT_FOUND => ToolErrorKind::UnknownTool,
                error_codes::INVALID_PARAMS => ToolErrorKind::InvalidArguments,
                _ => ToolErrorKind::ExecutionError,
            };
            debug!(code = err.code, "Tool call failed: {}", err.message);
            return Ok(ToolCallResult::failure(request, kind, err.message));
        }

        let result = response.result.unwrap_or(Value::Null);
        match serde_json::from_value::<CallToolResult>(result) {
            Ok(CallToolResult { payload }) => Ok(ToolCallResult::success(request, payload)),
            Err(e) => {
                warn!("Server returned an unreadable tool result: {}", e);
                Ok(ToolCallResult::failure(
                    request,
                    ToolErrorKind::ExecutionError,
                    format!("unreadable tool result: {e}"),
                ))
            }
        }
    }

    /// End the session.
    ///
    /// Closes the outbound stream so the server sees end of input, gives a
    /// spawned server a grace period to finish and exit, then kills it.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> TransportResult<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!("Closing transport failed: {}", e);
            }
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => info!("Tool server exited with {}", status),
                Ok(Err(e)) => warn!("Failed to wait for tool server: {}", e),
                Err(_) => {
                    warn!("Tool server did not exit within {:?}; killing it", SHUTDOWN_GRACE);
                    child.kill().await?;
                }
            }
        }

        let reader_task = self
            .reader_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut handle) = reader_task {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }

        let mut pending = lock_pending(&self.pending);
        pending.closed.get_or_insert_with(|| "client shut down".to_string());
        pending.waiters.clear();

        Ok(())
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// Send a request and wait for its response.
    ///
    /// `Ok(None)` means the timeout elapsed; the call is abandoned and its
    /// eventual response will be dropped by the reader.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> TransportResult<Option<JsonRpcResponse>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = lock_pending(&self.pending);
            if let Some(reason) = &pending.closed {
                return Err(TransportError::closed(reason.clone()));
            }
            pending.waiters.insert(id, tx);
        }

        debug!(id, method, "Sending request");
        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        if let Err(e) = self.send(request.into()).await {
            self.abandon(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(_)) => Err(TransportError::closed(self.closed_reason())),
            Err(_) => {
                self.abandon(id);
                let cancel = json!({ "requestId": id, "reason": "timeout" });
                if let Err(e) = self.notify("notifications/cancelled", Some(cancel)).await {
                    debug!("Could not send cancellation for {}: {}", id, e);
                }
                Ok(None)
            }
        }
    }

    /// A request whose failure ends the session: timeouts and error
    /// responses are both fatal here.
    async fn control(&self, method: &str, params: Option<Value>) -> TransportResult<Value> {
        let response = self
            .request(method, params, self.call_timeout)
            .await?
            .ok_or_else(|| {
                TransportError::Unresponsive(format!(
                    "no answer to '{method}' within {:?}",
                    self.call_timeout
                ))
            })?;

        match (response.result, response.error) {
            (_, Some(err)) => Err(TransportError::protocol(format!(
                "'{method}' failed: {} (code {})",
                err.message, err.code
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(TransportError::protocol(format!(
                "empty response to '{method}'"
            ))),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()> {
        self.send(JsonRpcNotification::new(method, params).into())
            .await
    }

    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => writer.send(&message).await,
            None => Err(TransportError::closed("client shut down")),
        }
    }

    fn abandon(&self, id: i64) {
        lock_pending(&self.pending).waiters.remove(&id);
    }

    fn closed_reason(&self) -> String {
        lock_pending(&self.pending)
            .closed
            .clone()
            .unwrap_or_else(|| "connection closed".to_string())
    }
}

#[async_trait]
impl ToolInvoker for McpClient {
    async fn discover(&self) -> TransportResult<Arc<CapabilityManifest>> {
        McpClient::discover(self).await
    }

    async fn invoke(&self, request: &ToolCallRequest) -> TransportResult<ToolCallResult> {
        McpClient::invoke(self, request, self.call_timeout).await
    }
}

/// Route incoming messages to waiting callers until the stream ends.
async fn read_loop(mut reader: FrameReader<DynReader>, pending: SharedPending) {
    let reason = loop {
        match reader.receive().await {
            Ok(JsonRpcMessage::Response(response)) => dispatch(&pending, response),
            Ok(JsonRpcMessage::Request(request)) => warn!(
                "Ignoring server-initiated request '{}' (id {})",
                request.method, request.id
            ),
            Ok(JsonRpcMessage::Notification(notification)) => {
                debug!("Server notification: {}", notification.method)
            }
            Err(e) => {
                if e.is_closed() {
                    info!("Tool server closed the connection");
                } else {
                    error!("Transport failed: {}", e);
                }
                break e.to_string();
            }
        }
    };

    // Dropping the senders wakes every waiting caller.
    let mut pending = lock_pending(&pending);
    pending.closed.get_or_insert(reason);
    pending.waiters.clear();
}

fn dispatch(pending: &SharedPending, response: JsonRpcResponse) {
    if !response.is_well_formed() {
        warn!(
            "Discarding malformed response for id {}: needs exactly one of result/error",
            response.id
        );
        return;
    }

    let RpcId::Number(id) = response.id else {
        warn!("Discarding response with foreign id {}", response.id);
        return;
    };

    let waiter = lock_pending(pending).waiters.remove(&id);
    match waiter {
        Some(tx) => {
            if tx.send(response).is_err() {
                debug!("Caller for {} is gone; dropping its response", id);
            }
        }
        None => warn!("Discarding response for unknown or abandoned id {}", id),
    }
}
