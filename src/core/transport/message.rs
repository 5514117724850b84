//! JSON-RPC 2.0 message types carried by the transport.
//!
//! Every frame on the wire is exactly one [`JsonRpcMessage`]. The method
//! payloads (`initialize`, `tools/list`, `tools/call`) are defined at the
//! bottom of this file so both the server and the client proxy share one
//! definition of the protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::tools::ToolSpec;

/// Protocol version announced during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request ID. Numbers are allocated by the client proxy; strings
/// are accepted from other peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Any message that can travel over the transport.
///
/// Variant order matters for untagged decoding: a request needs both `id`
/// and `method`, a response needs `id` only, and anything with just a
/// `method` is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// Standard JSON-RPC 2.0 error codes plus the tool-specific ones.
pub mod error_codes {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// `tools/call` named a tool the registry does not know.
    pub const TOOL_NOT_FOUND: i64 = -32001;
    /// The tool ran and the underlying database reported an error.
    pub const TOOL_EXECUTION_FAILED: i64 = -32002;
}

impl JsonRpcRequest {
    pub fn new(id: RpcId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: RpcId, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Method not found error.
    pub fn method_not_found(id: RpcId, method: &str) -> Self {
        Self::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    /// Invalid request error.
    pub fn invalid_request(id: RpcId) -> Self {
        Self::error(id, error_codes::INVALID_REQUEST, "Invalid Request")
    }

    /// Invalid params error.
    pub fn invalid_params(id: RpcId, msg: impl Into<String>) -> Self {
        Self::error(id, error_codes::INVALID_PARAMS, msg)
    }

    /// Internal error.
    pub fn internal_error(id: RpcId, msg: impl Into<String>) -> Self {
        Self::error(id, error_codes::INTERNAL_ERROR, msg)
    }

    /// A well-formed response carries exactly one of `result` and `error`.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

// ============================================================================
// Method payloads
// ============================================================================

/// Peer identification exchanged during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Parameters for `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client_info: PeerInfo,
}

/// Result of `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: PeerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSpec>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Result of a successful `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> JsonRpcMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_request() {
        let msg = decode(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
        match msg {
            JsonRpcMessage::Request(req) => {
                assert_eq!(req.id, RpcId::Number(7));
                assert_eq!(req.method, "tools/list");
                assert!(req.params.is_none());
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_response() {
        let msg = decode(json!({"jsonrpc": "2.0", "id": "abc", "result": {"ok": true}}));
        match msg {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.id, RpcId::String("abc".into()));
                assert!(resp.is_well_formed());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_notification() {
        let msg = decode(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn test_response_without_result_or_error_is_malformed() {
        let msg = decode(json!({"jsonrpc": "2.0", "id": 1}));
        match msg {
            JsonRpcMessage::Response(resp) => assert!(!resp.is_well_formed()),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_error_response_skips_result_field() {
        let resp = JsonRpcResponse::method_not_found(RpcId::Number(3), "nope");
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }
}
