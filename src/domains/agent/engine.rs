//! Reasoning engine boundary.

use async_trait::async_trait;
use serde_json::Value;

use super::error::EngineError;
use super::history::ConversationHistory;
use crate::domains::tools::CapabilityManifest;

/// A tool invocation as requested by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedCall {
    /// Engine-chosen id; may be empty or repeated.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl RequestedCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What the engine decided for the current history.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    FinalAnswer(String),
    /// Calls to run, in order, before asking again.
    RequestedCalls(Vec<RequestedCall>),
}

/// Anything that can pick the next step of a conversation.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn respond(
        &self,
        history: &ConversationHistory,
        manifest: &CapabilityManifest,
    ) -> Result<EngineResponse, EngineError>;
}

/// Scripted engine for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::domains::agent::history::ConversationEntry;

    /// Replays a fixed list of responses and records what it was shown.
    #[derive(Default)]
    pub struct ScriptedEngine {
        script: Mutex<VecDeque<Result<EngineResponse, String>>>,
        seen: Mutex<Vec<Vec<ConversationEntry>>>,
    }

    impl ScriptedEngine {
        pub fn new(responses: impl IntoIterator<Item = EngineResponse>) -> Self {
            Self {
                script: Mutex::new(responses.into_iter().map(Ok).collect()),
                seen: Mutex::default(),
            }
        }

        /// Queue a response.
        pub fn push(&self, response: EngineResponse) {
            self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(Ok(response));
        }

        /// Queue a failure.
        pub fn push_error(&self, message: impl Into<String>) {
            self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(Err(message.into()));
        }

        /// Histories passed to `respond`, one per call.
        pub fn seen(&self) -> Vec<Vec<ConversationEntry>> {
            self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn respond(
            &self,
            history: &ConversationHistory,
            _manifest: &CapabilityManifest,
        ) -> Result<EngineResponse, EngineError> {
            self.seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(history.entries().cloned().collect());

            match self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(EngineError::invalid_response(message)),
                None => Err(EngineError::invalid_response("script exhausted")),
            }
        }
    }
}
