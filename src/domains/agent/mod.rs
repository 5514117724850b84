//! Agent domain module.
//!
//! Everything on the caller side of the tool server: the conversation
//! history, the reasoning engine boundary and its OpenAI adapter, the
//! orchestrator that drives a turn, and the interactive console.
//!
//! - `history.rs` - bounded conversation history
//! - `engine.rs` - reasoning engine trait
//! - `openai.rs` - chat completions adapter
//! - `orchestrator.rs` - turn loop over engine and tools
//! - `console.rs` - line-oriented front end
//! - `error.rs` - engine and turn errors

pub mod console;
pub mod engine;
mod error;
mod history;
mod openai;
mod orchestrator;

pub use engine::{EngineResponse, ReasoningEngine, RequestedCall};
pub use error::{EngineError, TurnError};
pub use history::{ConversationEntry, ConversationHistory, MIN_HISTORY_LEN};
pub use openai::OpenAiEngine;
pub use orchestrator::{NoopObserver, Orchestrator, ToolCallObserver, ToolInvoker};
