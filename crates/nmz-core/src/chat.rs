use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "cortex")]
    Assistant,
}

/// One turn of the assistant conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Memories the assistant considered relevant to this turn. Empty when none.
    #[serde(default)]
    pub related_memory_ids: Vec<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text, Vec::new())
    }

    pub fn assistant(text: impl Into<String>, related_memory_ids: Vec<String>) -> Self {
        Self::new(Sender::Assistant, text, related_memory_ids)
    }

    fn new(sender: Sender, text: impl Into<String>, related_memory_ids: Vec<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
            related_memory_ids,
        }
    }
}
