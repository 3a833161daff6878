use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::transcript::normalize_transcript;
use crate::wire::StoredAnswer;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fresh message identity. Block ids and toggle entries are keyed on it.
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp_ms: u64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { id: new_message_id(), role: Role::User, content: content.into(), timestamp_ms: now_ms() }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Assistant, content: content.into(), timestamp_ms: now_ms() }
    }

    /// Rebuild an assistant message from its stored transcript.
    pub fn from_stored(id: impl Into<String>, answer: &StoredAnswer, timestamp_ms: u64) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: normalize_transcript(answer),
            timestamp_ms,
        }
    }
}
