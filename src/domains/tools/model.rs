//! Tool data model shared by the server, the client proxy and the
//! orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the capability manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's arguments object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The ordered list of tools a server publishes.
///
/// Built once per server session and shared behind an `Arc`; never mutated
/// after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityManifest {
    tools: Vec<ToolSpec>,
}

impl CapabilityManifest {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A tool invocation requested by the reasoning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation token, unique among the calls of one turn.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Call-level failure kinds. None of them end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    ExecutionError,
    Timeout,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArguments => "InvalidArguments",
            Self::ExecutionError => "ExecutionError",
            Self::Timeout => "Timeout",
        };
        f.write_str(s)
    }
}

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: Value },
    Failure { kind: ToolErrorKind, message: String },
}

/// The single result produced for a [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Echo of the originating request id.
    pub id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, payload: Value) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Success { payload },
        }
    }

    pub fn failure(
        request: &ToolCallRequest,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    /// Text handed back to the reasoning engine: the payload as JSON, or an
    /// `{"error", "kind"}` object describing the failure.
    pub fn to_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { payload } => payload.to_string(),
            ToolOutcome::Failure { kind, message } => {
                serde_json::json!({ "error": message, "kind": kind }).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_serializes_as_list() {
        let manifest = CapabilityManifest::new(vec![ToolSpec {
            name: "list_tables".into(),
            description: "List tables".into(),
            input_schema: json!({"type": "object"}),
        }]);

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value[0]["name"], "list_tables");
        assert_eq!(value[0]["inputSchema"]["type"], "object");
        assert_eq!(manifest.names(), vec!["list_tables"]);
    }

    #[test]
    fn test_result_content() {
        let request = ToolCallRequest::new("call_1", "execute_sql", json!({"query": "x"}));

        let ok = ToolCallResult::success(&request, json!(["main.users"]));
        assert!(ok.is_success());
        assert_eq!(ok.to_content(), r#"["main.users"]"#);

        let failed = ToolCallResult::failure(&request, ToolErrorKind::Timeout, "timed out");
        assert_eq!(failed.id, "call_1");
        let content: Value = serde_json::from_str(&failed.to_content()).unwrap();
        assert_eq!(content, json!({"error": "timed out", "kind": "Timeout"}));
    }
}
