use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_emotion, to_i64, to_u64},
    models::{ConversationMessage, MessageRole},
};

fn parse_role(value: &str) -> Result<MessageRole> {
    match value {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        other => Err(anyhow!("unknown message role {other}")),
    }
}

fn row_to_message(row: &Row) -> Result<ConversationMessage> {
    let role: String = row.get("role")?;
    let emotion_context: Option<String> = row.get("emotion_context")?;
    let timestamp: String = row.get("timestamp")?;

    Ok(ConversationMessage {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        role: parse_role(&role)?,
        content: row.get("content")?,
        emotion_context: parse_optional_emotion(emotion_context)?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

impl Database {
    pub async fn add_conversation_message(
        &self,
        message: &ConversationMessage,
    ) -> Result<ConversationMessage> {
        let mut message = message.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO conversations (user_id, role, content, emotion_context, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.user_id,
                    message.role.as_str(),
                    message.content,
                    message.emotion_context.map(|e| e.as_str()),
                    format_datetime(&message.timestamp),
                ],
            )
            .with_context(|| "failed to insert conversation message")?;

            message.id = Some(conn.last_insert_rowid());
            Ok(message)
        })
        .await
    }

    /// The most recent `limit` messages, returned oldest first so they read
    /// as a transcript.
    pub async fn get_conversation_history(
        &self,
        user_id: i64,
        limit: u64,
    ) -> Result<Vec<ConversationMessage>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, role, content, emotion_context, timestamp
                 FROM conversations
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![user_id, to_i64(limit)?])?;
            let mut messages = Vec::new();
            while let Some(row) = rows.next()? {
                messages.push(row_to_message(row)?);
            }
            messages.reverse();

            Ok(messages)
        })
        .await
    }

    pub async fn count_conversation_messages(&self, user_id: i64) -> Result<u64> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            to_u64(count, "conversation count")
        })
        .await
    }

    pub async fn clear_conversation_history(&self, user_id: i64) -> Result<u64> {
        self.execute(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM conversations WHERE user_id = ?1",
                    params![user_id],
                )
                .with_context(|| "failed to clear conversation history")?;
            Ok(deleted as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewUser;
    use crate::models::Emotion;
    use chrono::{Duration, TimeZone, Utc};

    fn message(user_id: i64, role: MessageRole, content: &str, seconds: i64) -> ConversationMessage {
        ConversationMessage {
            id: None,
            user_id,
            role,
            content: content.to_string(),
            emotion_context: Some(Emotion::Sad),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
                + Duration::seconds(seconds),
        }
    }

    #[tokio::test]
    async fn history_keeps_latest_messages_in_reading_order() {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                username: "ana".into(),
                email: "ana@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();

        for (i, text) in ["hi", "hello", "rough day", "tell me"].iter().enumerate() {
            let role = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
            db.add_conversation_message(&message(user.id, role, text, i as i64))
                .await
                .unwrap();
        }

        let history = db.get_conversation_history(user.id, 3).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "rough day", "tell me"]);
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[0].emotion_context, Some(Emotion::Sad));

        assert_eq!(db.count_conversation_messages(user.id).await.unwrap(), 4);
        assert_eq!(db.clear_conversation_history(user.id).await.unwrap(), 4);
        assert!(db.get_conversation_history(user.id, 10).await.unwrap().is_empty());
    }
}
