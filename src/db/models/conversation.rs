//! Chat transcript data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Emotion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: Option<i64>,
    pub user_id: i64,
    pub role: MessageRole,
    pub content: String,
    /// Stabilized emotion at the time the message was written
    pub emotion_context: Option<Emotion>,
    pub timestamp: DateTime<Utc>,
}
