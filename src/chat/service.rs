use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use super::backend::{ChatBackend, ChatRequest};
use super::offline::OfflineResponder;
use crate::db::{ConversationMessage, Database, MessageRole};
use crate::detection::Observation;
use crate::error::ChatError;

/// Prior messages handed to the backend with each request.
pub const HISTORY_WINDOW: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: ConversationMessage,
    /// The backend failed and the offline responder answered instead
    pub used_fallback: bool,
}

/// Emotion-aware companion chat with a persisted transcript.
#[derive(Clone)]
pub struct ChatService {
    backend: Arc<dyn ChatBackend>,
    offline: OfflineResponder,
}

impl ChatService {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            offline: OfflineResponder,
        }
    }

    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineResponder))
    }

    pub fn responder(&self) -> &OfflineResponder {
        &self.offline
    }

    /// Store the user's message, ask the backend for an answer and store
    /// that too. `observation` is the user's current detected state.
    pub async fn send_message(
        &self,
        db: &Database,
        user_id: i64,
        text: &str,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let emotion = observation.label();

        let recent_history = db.get_conversation_history(user_id, HISTORY_WINDOW).await?;
        db.add_conversation_message(&ConversationMessage {
            id: None,
            user_id,
            role: MessageRole::User,
            content: text.to_string(),
            emotion_context: emotion,
            timestamp: now,
        })
        .await?;

        let request = ChatRequest::new(text, emotion, recent_history);
        let backend = Arc::clone(&self.backend);
        let answer = tokio::task::spawn_blocking(move || backend.respond(&request))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);

        let (content, used_fallback) = match answer {
            Ok(content) if !content.trim().is_empty() => (content, false),
            Ok(_) => {
                warn!("chat backend returned an empty answer for user {user_id}, using offline reply");
                (self.offline.reply(emotion), true)
            }
            Err(err) => {
                warn!("chat backend failed for user {user_id}, using offline reply: {err:#}");
                (self.offline.reply(emotion), true)
            }
        };

        let message = db
            .add_conversation_message(&ConversationMessage {
                id: None,
                user_id,
                role: MessageRole::Assistant,
                content,
                emotion_context: emotion,
                timestamp: now,
            })
            .await?;

        Ok(ChatReply {
            message,
            used_fallback,
        })
    }

    pub async fn history(
        &self,
        db: &Database,
        user_id: i64,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>, ChatError> {
        Ok(db.get_conversation_history(user_id, limit).await?)
    }

    pub async fn clear_history(&self, db: &Database, user_id: i64) -> Result<u64, ChatError> {
        Ok(db.clear_conversation_history(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use crate::detection::StabilizedReading;
    use crate::models::Emotion;
    use anyhow::{anyhow, Result};
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ChatBackend for Recording {
        fn respond(&self, request: &ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(format!("echo: {}", request.user_message))
        }
    }

    struct Broken;

    impl ChatBackend for Broken {
        fn respond(&self, _request: &ChatRequest) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn feeling(label: Emotion) -> Observation {
        Observation::Detected(StabilizedReading {
            label,
            confidence: 0.8,
            sample_count: 10,
            sequence: 1,
        })
    }

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                username: "ana".into(),
                email: "ana@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn passes_emotion_and_prior_history_to_backend() {
        let (db, user_id) = setup().await;
        let backend = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let service = ChatService::new(backend.clone());

        service
            .send_message(&db, user_id, "first", feeling(Emotion::Sad), Utc::now())
            .await
            .unwrap();
        let reply = service
            .send_message(&db, user_id, "  second  ", feeling(Emotion::Sad), Utc::now())
            .await
            .unwrap();

        assert!(!reply.used_fallback);
        assert_eq!(reply.message.content, "echo: second");
        assert_eq!(reply.message.role, MessageRole::Assistant);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].recent_history.is_empty());
        assert_eq!(seen[1].recent_history.len(), 2);
        assert_eq!(seen[1].current_emotion, Some(Emotion::Sad));
        assert_eq!(seen[1].user_message, "second");
    }

    #[tokio::test]
    async fn history_sent_to_backend_is_capped() {
        let (db, user_id) = setup().await;
        let backend = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let service = ChatService::new(backend.clone());

        for i in 0..8 {
            service
                .send_message(&db, user_id, &format!("message {i}"), Observation::Undetected, Utc::now())
                .await
                .unwrap();
        }

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.last().unwrap().recent_history.len(), HISTORY_WINDOW as usize);
        assert_eq!(db.count_conversation_messages(user_id).await.unwrap(), 16);
    }

    #[tokio::test]
    async fn failing_backend_falls_back_to_offline_reply() {
        let (db, user_id) = setup().await;
        let service = ChatService::new(Arc::new(Broken));

        let reply = service
            .send_message(&db, user_id, "hello", feeling(Emotion::Fear), Utc::now())
            .await
            .unwrap();

        assert!(reply.used_fallback);
        assert!(!reply.message.content.is_empty());
        assert_eq!(reply.message.emotion_context, Some(Emotion::Fear));

        let history = service.history(&db, user_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_writing() {
        let (db, user_id) = setup().await;
        let service = ChatService::offline();

        let err = service
            .send_message(&db, user_id, "   ", Observation::Undetected, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(db.count_conversation_messages(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_history_empties_the_transcript() {
        let (db, user_id) = setup().await;
        let service = ChatService::offline();
        service
            .send_message(&db, user_id, "hello", Observation::Undetected, Utc::now())
            .await
            .unwrap();

        assert_eq!(service.clear_history(&db, user_id).await.unwrap(), 2);
        assert!(service.history(&db, user_id, 10).await.unwrap().is_empty());
    }
}
