//! Conversation history.
//!
//! An append-only, bounded sequence of entries. When the bound is exceeded
//! the oldest non-system entries are evicted first; the system prompt stays.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domains::tools::{ToolCallRequest, ToolCallResult};

/// Smallest usable bound: the system prompt plus one more entry.
pub const MIN_HISTORY_LEN: usize = 2;

/// One conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationEntry {
    System {
        content: String,
    },
    User {
        content: String,
    },
    /// A final answer (`content`) or a batch of tool calls.
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        result: ToolCallResult,
    },
}

impl ConversationEntry {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn answer(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn tool(result: ToolCallResult) -> Self {
        Self::Tool { result }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// Bounded conversation history.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<ConversationEntry>,
    max_len: usize,
    evicted: usize,
}

impl ConversationHistory {
    /// Empty history holding at most `max_len` entries (at least
    /// [`MIN_HISTORY_LEN`]).
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_len: max_len.max(MIN_HISTORY_LEN),
            evicted: 0,
        }
    }

    /// History starting with a system prompt.
    pub fn with_system_prompt(prompt: impl Into<String>, max_len: usize) -> Self {
        let mut history = Self::new(max_len);
        history.push(ConversationEntry::system(prompt));
        history
    }

    /// Append an entry, evicting old ones if the bound is exceeded.
    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_len {
            let Some(oldest) = self.entries.iter().position(|e| !e.is_system()) else {
                break;
            };
            self.entries.remove(oldest);
            self.evicted += 1;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ConversationEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Entries dropped so far.
    pub fn evicted(&self) -> usize {
        self.evicted
    }
}
