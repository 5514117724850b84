//! Tool-specific error types.

use thiserror::Error;

use super::model::ToolErrorKind;
use crate::core::transport::message::error_codes;
use crate::domains::database::DatabaseError;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "invalid arguments" error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a new "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The call-level failure kind this error surfaces as.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::NotFound(_) => ToolErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            Self::ExecutionFailed(_) | Self::Internal(_) => ToolErrorKind::ExecutionError,
        }
    }

    /// JSON-RPC error code used when this error crosses the transport.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::NotFound(_) => error_codes::TOOL_NOT_FOUND,
            Self::InvalidArguments(_) => error_codes::INVALID_PARAMS,
            Self::ExecutionFailed(_) => error_codes::TOOL_EXECUTION_FAILED,
            Self::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl From<DatabaseError> for ToolError {
    fn from(err: DatabaseError) -> Self {
        Self::ExecutionFailed(err.to_string())
    }
}

/// Errors raised while building the tool registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two handlers were registered under the same name.
    #[error("Duplicate tool name: {0}")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code_mapping() {
        let err = ToolError::not_found("drop_everything");
        assert_eq!(err.kind(), ToolErrorKind::UnknownTool);
        assert_eq!(err.rpc_code(), error_codes::TOOL_NOT_FOUND);

        let err = ToolError::invalid_arguments("missing field `query`");
        assert_eq!(err.kind(), ToolErrorKind::InvalidArguments);
        assert_eq!(err.rpc_code(), error_codes::INVALID_PARAMS);

        let err: ToolError = DatabaseError::EmptyStatement.into();
        assert_eq!(err.kind(), ToolErrorKind::ExecutionError);
        assert_eq!(err.rpc_code(), error_codes::TOOL_EXECUTION_FAILED);
        assert_eq!(err.to_string(), "Execution failed: Empty SQL statement");
    }
}
