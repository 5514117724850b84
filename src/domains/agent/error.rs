//! Agent error types.

use thiserror::Error;

use crate::core::transport::TransportError;

/// Errors from the reasoning engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The HTTP request itself failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The response could not be interpreted.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Errors that end a user turn.
///
/// Call-level tool failures never show up here: they are recorded in the
/// conversation and handed back to the engine.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The engine kept asking for tools past the round-trip bound.
    #[error("No final answer after {limit} reasoning steps; the question was abandoned")]
    TurnLimitExceeded { limit: usize },

    /// The tool server connection is gone. Ends the session.
    #[error("Lost connection to the tool server: {0}")]
    Transport(#[from] TransportError),

    /// The reasoning engine could not produce a response.
    #[error("Reasoning engine failed: {0}")]
    Engine(#[from] EngineError),
}

impl TurnError {
    /// Whether the session must end.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
