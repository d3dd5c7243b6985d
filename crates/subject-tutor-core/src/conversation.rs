//! Per-key conversation logs.
//!
//! Logs are append-only: entries are never reordered or edited after they
//! are pushed, and the only removal is clearing a whole log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::KbKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Ordered message log for one key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Conversation logs for every key visited in a session.
#[derive(Debug, Clone, Default)]
pub struct Conversations {
    logs: HashMap<KbKey, ConversationLog>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages for `key`; empty if the key has no log yet.
    pub fn messages(&self, key: &KbKey) -> &[Message] {
        self.logs.get(key).map(|l| l.messages()).unwrap_or(&[])
    }

    /// The log for `key`, created empty on first use.
    pub fn log_mut(&mut self, key: &KbKey) -> &mut ConversationLog {
        self.logs.entry(key.clone()).or_default()
    }

    pub fn push(&mut self, key: &KbKey, message: Message) -> &Message {
        self.log_mut(key).push(message)
    }

    /// Empty the log for `key`; logs for other keys are untouched.
    pub fn clear(&mut self, key: &KbKey) {
        if let Some(log) = self.logs.get_mut(key) {
            log.clear();
        }
    }
}
