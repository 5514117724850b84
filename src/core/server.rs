//! Tool server implementation and session handling.
//!
//! [`McpServer`] answers JSON-RPC requests (`initialize`, `ping`,
//! `tools/list`, `tools/call`) by delegating to the tool executor. It is
//! cheap to clone; every clone shares the same executor and therefore the
//! same database connection, whichever transport session it serves.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::config::Config;
use super::error::Result;
use super::transport::message::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JSONRPC_VERSION,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION,
    PeerInfo, RpcId,
};
use super::transport::{FrameReader, FrameWriter, JsonRpcMessage, TransportResult};
use crate::domains::database::{DatabaseBackend, SqliteBackend};
use crate::domains::tools::{CapabilityManifest, ToolExecutor, ToolRegistry};

const INSTRUCTIONS: &str = "SQL tools: list_tables, describe_table(table_name), execute_sql(query).";

/// The tool server.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Executor owning the database connection.
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a server around an already opened backend.
    pub fn with_backend(config: Config, backend: Box<dyn DatabaseBackend>) -> Result<Self> {
        let registry = Arc::new(ToolRegistry::with_builtin_tools()?);
        info!("Registered tools: {}", registry.tool_names().join(", "));

        Ok(Self {
            config: Arc::new(config),
            executor: ToolExecutor::new(registry, backend),
        })
    }

    /// Open the configured database and create the server.
    pub fn open(config: Config) -> Result<Self> {
        let backend = SqliteBackend::open(&config.database)?;
        Self::with_backend(config, Box::new(backend))
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// The published capability manifest.
    pub fn list_tools(&self) -> Arc<CapabilityManifest> {
        self.executor.list_tools()
    }

    // ========================================================================
    // Request dispatch
    // ========================================================================

    /// Answer one request.
    #[instrument(skip_all, fields(id = %request.id, method = %request.method))]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        if request.jsonrpc != JSONRPC_VERSION {
            warn!("Rejecting request with jsonrpc={:?}", request.jsonrpc);
            return JsonRpcResponse::invalid_request(id);
        }

        debug!("Handling request");

        match request.method.as_str() {
            "initialize" => {
                if let Some(params) = request.params {
                    match serde_json::from_value::<InitializeParams>(params) {
                        Ok(p) => info!(
                            "Client connected: {} (protocol {})",
                            p.client_info.name, p.protocol_version
                        ),
                        Err(e) => return JsonRpcResponse::invalid_params(id, e.to_string()),
                    }
                }

                respond(
                    id,
                    &InitializeResult {
                        protocol_version: PROTOCOL_VERSION.to_string(),
                        server_info: PeerInfo {
                            name: self.name().to_string(),
                            version: Some(self.version().to_string()),
                        },
                        instructions: Some(INSTRUCTIONS.to_string()),
                    },
                )
            }

            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),

            "tools/list" => respond(
                id,
                &ListToolsResult {
                    tools: self.list_tools().tools().to_vec(),
                },
            ),

            "tools/call" => {
                let params: CallToolParams = match request
                    .params
                    .map(serde_json::from_value)
                    .transpose()
                {
                    Ok(Some(p)) => p,
                    Ok(None) => return JsonRpcResponse::invalid_params(id, "Missing params"),
                    Err(e) => return JsonRpcResponse::invalid_params(id, e.to_string()),
                };

                match self.executor.invoke(&params.name, params.arguments).await {
                    Ok(payload) => respond(id, &CallToolResult { payload }),
                    Err(e) => JsonRpcResponse::error(id, e.rpc_code(), e.to_string()),
                }
            }

            other => {
                warn!("Unknown method: {}", other);
                JsonRpcResponse::method_not_found(id, other)
            }
        }
    }

    /// Notifications need no answer; they are only logged.
    pub fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client finished initialization"),
            "notifications/cancelled" => info!(
                params = ?notification.params,
                "Client abandoned a request; it will still run to completion"
            ),
            other => debug!("Ignoring notification: {}", other),
        }
    }

    // ========================================================================
    // Session loop
    // ========================================================================

    /// Serve one session until the peer closes its side.
    ///
    /// Each request runs in its own task and its response is written as soon
    /// as it is ready, so responses can overtake each other. In-flight
    /// requests are allowed to finish after the peer stops sending.
    pub async fn serve<R, W>(
        &self,
        mut reader: FrameReader<R>,
        writer: FrameWriter<W>,
    ) -> TransportResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let writer = Arc::new(Mutex::new(writer));
        let mut in_flight = JoinSet::new();

        let outcome = loop {
            let message = match reader.receive().await {
                Ok(message) => message,
                Err(e) if e.is_closed() => break Ok(()),
                Err(e) => {
                    error!("Session ended on transport error: {}", e);
                    break Err(e);
                }
            };

            match message {
                JsonRpcMessage::Request(request) => {
                    let server = self.clone();
                    let writer = Arc::clone(&writer);
                    in_flight.spawn(async move {
                        let response = server.handle_request(request).await;
                        writer.lock().await.send(&response.into()).await
                    });
                }
                JsonRpcMessage::Notification(notification) => {
                    self.handle_notification(&notification)
                }
                JsonRpcMessage::Response(response) => {
                    warn!("Discarding unexpected response with id {}", response.id)
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                log_write_outcome(joined);
            }
        };

        while let Some(joined) = in_flight.join_next().await {
            log_write_outcome(joined);
        }

        if let Err(e) = writer.lock().await.close().await {
            debug!("Closing writer failed: {}", e);
        }

        outcome
    }

    /// Serve this server over an in-memory pipe and return the client end.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn connect_in_process(&self) -> super::transport::Connection {
        use tokio::io::BufReader;

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client_io);

        let server = self.clone();
        tokio::spawn(async move {
            let reader = FrameReader::new(BufReader::new(server_read));
            let writer = FrameWriter::new(server_write);
            if let Err(e) = server.serve(reader, writer).await {
                warn!("In-process session ended: {}", e);
            }
        });

        super::transport::Connection::from_io(client_read, client_write)
    }
}

fn respond<T: Serialize>(id: RpcId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::internal_error(id, e.to_string()),
    }
}

fn log_write_outcome(joined: std::result::Result<TransportResult<()>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to write response: {}", e),
        Err(e) => error!("Request task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::message::error_codes;
    use crate::core::transport::{Connection, JsonRpcMessage};
    use serde_json::{Value, json};

    fn server() -> McpServer {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        McpServer::with_backend(Config::default(), Box::new(db)).unwrap()
    }

    async fn call(server: &McpServer, method: &str, params: Option<Value>) -> JsonRpcResponse {
        server
            .handle_request(JsonRpcRequest::new(RpcId::Number(1), method, params))
            .await
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server();
        let resp = call(
            &server,
            "initialize",
            Some(json!({"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "test"}})),
        )
        .await;

        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "sql-mcp-server");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let resp = call(&server(), "tools/list", None).await;
        let tools = resp.result.unwrap()["tools"].clone();
        let names: Vec<_> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["list_tables", "describe_table", "execute_sql"]);
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let resp = call(
            &server(),
            "tools/call",
            Some(json!({"name": "list_tables", "arguments": {}})),
        )
        .await;
        assert_eq!(resp.result.unwrap()["payload"][0]["table"], "users");
    }

    #[tokio::test]
    async fn test_tools_call_error_codes() {
        let server = server();

        let resp = call(&server, "tools/call", Some(json!({"name": "nope"}))).await;
        assert_eq!(resp.error.unwrap().code, error_codes::TOOL_NOT_FOUND);

        let resp = call(
            &server,
            "tools/call",
            Some(json!({"name": "execute_sql", "arguments": {"sql": "SELECT 1"}})),
        )
        .await;
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);

        let resp = call(
            &server,
            "tools/call",
            Some(json!({"name": "execute_sql", "arguments": {"query": "SELEC 1"}})),
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::TOOL_EXECUTION_FAILED);
        assert!(err.message.contains("syntax error"));

        let resp = call(&server, "tools/call", None).await;
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method_and_bad_version() {
        let server = server();

        let resp = call(&server, "resources/list", None).await;
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let mut request = JsonRpcRequest::new(RpcId::Number(9), "ping", None);
        request.jsonrpc = "1.0".into();
        let resp = server.handle_request(request).await;
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_serve_answers_over_pipe() {
        let Connection {
            mut reader,
            mut writer,
            ..
        } = server().connect_in_process();

        writer
            .send(&JsonRpcNotification::new("notifications/initialized", None).into())
            .await
            .unwrap();
        writer
            .send(&JsonRpcRequest::new(RpcId::String("a".into()), "ping", None).into())
            .await
            .unwrap();

        match reader.receive().await.unwrap() {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.id, RpcId::String("a".into()));
                assert!(resp.is_well_formed());
            }
            other => panic!("expected response, got {other:?}"),
        }

        // Closing our side ends the session; the server closes its side too.
        writer.close().await.unwrap();
        assert!(reader.receive().await.unwrap_err().is_closed());
    }
}
