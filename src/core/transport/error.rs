//! Transport error types.
//!
//! Every `TransportError` is fatal to the session that observed it: there
//! are no retries at this layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur in transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to reach the server endpoint.
    #[error("Failed to connect to {address}: {source}")]
    ConnectError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to launch the server process.
    #[error("Failed to spawn server process '{command}': {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the stream or the session was shut down.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// IO error during transport.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A frame could not be decoded as a JSON-RPC message.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// JSON serialization error on the outbound path.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The peer answered a control request in a way the protocol forbids.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The peer did not answer a control request in time.
    #[error("Peer unresponsive: {0}")]
    Unresponsive(String),
}

impl TransportError {
    /// Create a bind error.
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindError {
            address: address.into(),
            source,
        }
    }

    /// Create a connect error.
    pub fn connect(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::ConnectError {
            address: address.into(),
            source,
        }
    }

    /// Create a spawn error.
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnError {
            command: command.into(),
            source,
        }
    }

    /// Create a closed-connection error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed(reason.into())
    }

    /// Create a malformed-frame error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Whether this error is an orderly end of stream rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}
