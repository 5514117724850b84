//! OpenAI-compatible chat completions adapter.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::engine::{EngineResponse, ReasoningEngine, RequestedCall};
use super::error::EngineError;
use super::history::{ConversationEntry, ConversationHistory};
use crate::core::config::LlmConfig;
use crate::domains::tools::CapabilityManifest;

/// Reasoning engine backed by a `/chat/completions` endpoint.
pub struct OpenAiEngine {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEngine {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    /// Build from config; `None` when no API key is set.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Request body for the given conversation state.
    pub fn build_request(&self, history: &ConversationHistory, manifest: &CapabilityManifest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": to_messages(history),
        });

        if !manifest.is_empty() {
            let tools: Vec<Value> = manifest
                .tools()
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

/// Convert history to chat messages.
///
/// Tool entries whose assistant entry was evicted are left out: the API
/// rejects tool messages that answer no visible call.
fn to_messages(history: &ConversationHistory) -> Vec<Value> {
    let mut visible_calls = HashSet::new();
    let mut messages = Vec::with_capacity(history.len());

    for entry in history.entries() {
        match entry {
            ConversationEntry::System { content } => {
                messages.push(json!({"role": "system", "content": content}))
            }
            ConversationEntry::User { content } => {
                messages.push(json!({"role": "user", "content": content}))
            }
            ConversationEntry::Assistant {
                content,
                tool_calls,
            } => {
                let mut message = json!({"role": "assistant", "content": content});
                if !tool_calls.is_empty() {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|call| {
                            visible_calls.insert(call.id.as_str());
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": raw_arguments(&call.arguments),
                                }
                            })
                        })
                        .collect();
                    message["tool_calls"] = Value::Array(calls);
                }
                messages.push(message);
            }
            ConversationEntry::Tool { result } => {
                if !visible_calls.contains(result.id.as_str()) {
                    debug!("Skipping tool result {} whose call was evicted", result.id);
                    continue;
                }
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": result.id,
                    "content": result.to_content(),
                }));
            }
        }
    }

    messages
}

/// Arguments as the API expects them: a JSON document in a string.
fn raw_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Interpret a chat completions response body.
pub fn parse_response(body: &Value) -> Result<EngineResponse, EngineError> {
    let message = &body["choices"][0]["message"];
    if message.is_null() {
        return Err(EngineError::invalid_response("missing choices[0].message"));
    }

    if let Some(calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
        let requested = calls
            .iter()
            .map(|call| {
                let name = call["function"]["name"].as_str().ok_or_else(|| {
                    EngineError::invalid_response("tool call without a function name")
                })?;
                Ok(RequestedCall::new(
                    call["id"].as_str().unwrap_or_default(),
                    name,
                    parse_arguments(&call["function"]["arguments"]),
                ))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        return Ok(EngineResponse::RequestedCalls(requested));
    }

    message["content"]
        .as_str()
        .map(|content| EngineResponse::FinalAnswer(content.to_string()))
        .ok_or_else(|| EngineError::invalid_response("message has neither content nor tool calls"))
}

/// Decode the arguments string. Text that is not JSON is kept as a string
/// so the server rejects it as invalid arguments.
fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(text) if text.trim().is_empty() => json!({}),
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            warn!("Tool call arguments are not valid JSON: {}", e);
            Value::String(text.clone())
        }),
        Value::Null => json!({}),
        other => other.clone(),
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn respond(
        &self,
        history: &ConversationHistory,
        manifest: &CapabilityManifest,
    ) -> Result<EngineResponse, EngineError> {
        let url = self.url();
        let body = self.build_request(history, manifest);

        debug!("OpenAI request to {} ({} messages)", url, history.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        parse_response(&body)
    }
}
