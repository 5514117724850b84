//! Conversation orchestrator.
//!
//! Drives one user turn: ask the engine, run the calls it requests through
//! the tool invoker, record every result, and ask again until the engine
//! gives a final answer or the round-trip bound is hit.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::engine::{EngineResponse, ReasoningEngine, RequestedCall};
use super::error::{EngineError, TurnError};
use super::history::{ConversationEntry, ConversationHistory};
use crate::core::config::AgentConfig;
use crate::core::transport::TransportResult;
use crate::domains::tools::{CapabilityManifest, ToolCallRequest, ToolCallResult};

/// Caller-side access to the tool server.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// The session's capability manifest.
    async fn discover(&self) -> TransportResult<Arc<CapabilityManifest>>;

    /// Run one call. Call-level failures are `Ok` with a failed outcome.
    async fn invoke(&self, request: &ToolCallRequest) -> TransportResult<ToolCallResult>;
}

/// Hook notified around every tool call.
pub trait ToolCallObserver: Send + Sync {
    fn on_call_start(&self, _request: &ToolCallRequest) {}

    fn on_call_finish(&self, _result: &ToolCallResult) {}
}

/// Observer that does nothing.
pub struct NoopObserver;

impl ToolCallObserver for NoopObserver {}

/// Owns the conversation of one session.
pub struct Orchestrator {
    engine: Arc<dyn ReasoningEngine>,
    invoker: Arc<dyn ToolInvoker>,
    observer: Arc<dyn ToolCallObserver>,
    manifest: Arc<CapabilityManifest>,
    history: ConversationHistory,
    config: AgentConfig,
    turns: u64,
}

impl Orchestrator {
    /// Discover the tools and start a conversation with the system prompt.
    pub async fn start(
        engine: Arc<dyn ReasoningEngine>,
        invoker: Arc<dyn ToolInvoker>,
        config: AgentConfig,
    ) -> TransportResult<Self> {
        let manifest = invoker.discover().await?;
        info!("Conversation ready with tools: {}", manifest.names().join(", "));

        Ok(Self {
            engine,
            invoker,
            observer: Arc::new(NoopObserver),
            manifest,
            history: ConversationHistory::with_system_prompt(
                config.system_prompt.clone(),
                config.max_history,
            ),
            config,
            turns: 0,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolCallObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn manifest(&self) -> &CapabilityManifest {
        &self.manifest
    }

    /// Run one user turn to its final answer.
    #[instrument(skip_all, fields(turn = self.turns + 1))]
    pub async fn run_turn(&mut self, input: &str) -> Result<String, TurnError> {
        self.turns += 1;
        let turn = self.turns;
        let mut used_ids = HashSet::new();
        let mut generated = 0usize;

        self.history.push(ConversationEntry::user(input));

        for round in 1..=self.config.max_round_trips {
            debug!(round, "Asking reasoning engine");
            let response = self.engine.respond(&self.history, &self.manifest).await?;

            let calls = match response {
                EngineResponse::FinalAnswer(answer) => {
                    info!(round, "Final answer received");
                    self.history.push(ConversationEntry::answer(answer.clone()));
                    return Ok(answer);
                }
                EngineResponse::RequestedCalls(calls) if calls.is_empty() => {
                    return Err(EngineError::invalid_response(
                        "engine requested an empty batch of tool calls",
                    )
                    .into());
                }
                EngineResponse::RequestedCalls(calls) => calls,
            };

            let requests: Vec<ToolCallRequest> = calls
                .into_iter()
                .map(|call| assign_id(call, turn, &mut used_ids, &mut generated))
                .collect();

            info!(round, "Engine requested {} tool call(s)", requests.len());
            self.history
                .push(ConversationEntry::tool_calls(requests.clone()));

            if self.config.parallel_tool_calls {
                let results = join_all(requests.iter().map(|r| self.execute(r))).await;
                for result in results {
                    self.history.push(ConversationEntry::tool(result?));
                }
            } else {
                for request in &requests {
                    let result = self.execute(request).await?;
                    self.history.push(ConversationEntry::tool(result));
                }
            }
        }

        warn!(
            "Turn {} abandoned after {} round-trips",
            turn, self.config.max_round_trips
        );
        Err(TurnError::TurnLimitExceeded {
            limit: self.config.max_round_trips,
        })
    }

    async fn execute(&self, request: &ToolCallRequest) -> TransportResult<ToolCallResult> {
        self.observer.on_call_start(request);
        let result = self.invoker.invoke(request).await?;
        if !result.is_success() {
            debug!(call_id = %result.id, "Tool call failed; result goes back to the engine");
        }
        self.observer.on_call_finish(&result);
        Ok(result)
    }
}

/// Keep the engine's id when it is usable, otherwise generate one that is
/// unique within the turn.
fn assign_id(
    call: RequestedCall,
    turn: u64,
    used: &mut HashSet<String>,
    generated: &mut usize,
) -> ToolCallRequest {
    let mut id = call.id;
    while id.is_empty() || used.contains(&id) {
        *generated += 1;
        id = format!("call_{turn}_{generated}");
    }
    used.insert(id.clone());
    ToolCallRequest::new(id, call.name, call.arguments)
}
