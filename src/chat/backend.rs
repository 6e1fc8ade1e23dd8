use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::db::{ConversationMessage, MessageRole};
use crate::models::Emotion;

/// How the companion should pitch its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Cheerful,
    Comforting,
    Calming,
    Friendly,
    Reassuring,
    Curious,
    Understanding,
}

pub fn tone_for(emotion: Option<Emotion>) -> Tone {
    match emotion {
        Some(Emotion::Happy) => Tone::Cheerful,
        Some(Emotion::Sad) => Tone::Comforting,
        Some(Emotion::Angry) => Tone::Calming,
        Some(Emotion::Fear) => Tone::Reassuring,
        Some(Emotion::Surprise) => Tone::Curious,
        Some(Emotion::Disgust) => Tone::Understanding,
        Some(Emotion::Neutral) | None => Tone::Friendly,
    }
}

/// Everything a language-model backend needs to answer one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_message: String,
    pub current_emotion: Option<Emotion>,
    pub tone: Tone,
    /// Same emotion on this and the previous two user messages
    pub emotion_persists: bool,
    /// Prior transcript, oldest first
    pub recent_history: Vec<ConversationMessage>,
}

impl ChatRequest {
    pub fn new(
        user_message: impl Into<String>,
        current_emotion: Option<Emotion>,
        recent_history: Vec<ConversationMessage>,
    ) -> Self {
        let emotion_persists = current_emotion.is_some_and(|current| {
            let previous: Vec<Option<Emotion>> = recent_history
                .iter()
                .rev()
                .filter(|message| message.role == MessageRole::User)
                .take(2)
                .map(|message| message.emotion_context)
                .collect();
            previous.len() == 2 && previous.iter().all(|emotion| *emotion == Some(current))
        });

        Self {
            user_message: user_message.into(),
            current_emotion,
            tone: tone_for(current_emotion),
            emotion_persists,
            recent_history,
        }
    }
}

/// A conversational model. Called from a blocking thread.
pub trait ChatBackend: Send + Sync {
    fn respond(&self, request: &ChatRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_message(emotion: Option<Emotion>) -> ConversationMessage {
        ConversationMessage {
            id: None,
            user_id: 1,
            role: MessageRole::User,
            content: "hi".into(),
            emotion_context: emotion,
            timestamp: Utc::now(),
        }
    }

    fn assistant_message() -> ConversationMessage {
        ConversationMessage {
            role: MessageRole::Assistant,
            emotion_context: None,
            ..user_message(None)
        }
    }

    #[test]
    fn tone_follows_emotion() {
        assert_eq!(tone_for(Some(Emotion::Sad)), Tone::Comforting);
        assert_eq!(tone_for(Some(Emotion::Angry)), Tone::Calming);
        assert_eq!(tone_for(None), Tone::Friendly);
    }

    #[test]
    fn persistence_looks_at_previous_user_messages_only() {
        let history = vec![
            user_message(Some(Emotion::Sad)),
            assistant_message(),
            user_message(Some(Emotion::Sad)),
            assistant_message(),
        ];
        let request = ChatRequest::new("still down", Some(Emotion::Sad), history.clone());
        assert!(request.emotion_persists);
        assert_eq!(request.tone, Tone::Comforting);

        let request = ChatRequest::new("better now", Some(Emotion::Happy), history);
        assert!(!request.emotion_persists);
    }

    #[test]
    fn short_history_never_persists() {
        let request = ChatRequest::new("hi", Some(Emotion::Sad), vec![user_message(Some(Emotion::Sad))]);
        assert!(!request.emotion_persists);
    }
}
