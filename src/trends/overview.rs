use chrono::{DateTime, Utc};
use serde::Serialize;

use super::summary::{summarize, Trend};
use crate::db::{Database, User};
use crate::error::StorageError;
use crate::models::TimeRange;

/// Activity totals for one account plus weekly and monthly trends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub user: User,
    pub total_emotion_records: u64,
    pub total_messages: u64,
    pub last_7_days: Trend,
    pub last_30_days: Trend,
}

/// `None` when the user does not exist.
pub async fn user_overview(
    db: &Database,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<UserOverview>, StorageError> {
    let Some(user) = db.get_user_by_id(user_id).await? else {
        return Ok(None);
    };

    let total_emotion_records = db.count_emotion_records(user_id).await?;
    let total_messages = db.count_conversation_messages(user_id).await?;
    let last_7_days = summarize(db, user_id, TimeRange::last_days(7, now)).await?;
    let last_30_days = summarize(db, user_id, TimeRange::last_days(30, now)).await?;

    Ok(Some(UserOverview {
        user,
        total_emotion_records,
        total_messages,
        last_7_days,
        last_30_days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConversationMessage, EmotionRecord, MessageRole, NewUser};
    use crate::models::Emotion;
    use chrono::Duration;

    #[tokio::test]
    async fn counts_everything_but_trends_only_their_window() {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                username: "ana".into(),
                email: "ana@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let now = Utc::now();

        for (label, days_ago) in [(Emotion::Happy, 1), (Emotion::Sad, 10), (Emotion::Fear, 60)] {
            db.insert_emotion_record(&EmotionRecord {
                id: None,
                user_id: user.id,
                session_id: "s".into(),
                label,
                confidence: 0.7,
                timestamp: now - Duration::days(days_ago),
                context: None,
            })
            .await
            .unwrap();
        }
        db.add_conversation_message(&ConversationMessage {
            id: None,
            user_id: user.id,
            role: MessageRole::User,
            content: "hello".into(),
            emotion_context: Some(Emotion::Happy),
            timestamp: now,
        })
        .await
        .unwrap();

        let overview = user_overview(&db, user.id, now).await.unwrap().unwrap();
        assert_eq!(overview.user.username, "ana");
        assert_eq!(overview.total_emotion_records, 3);
        assert_eq!(overview.total_messages, 1);
        assert_eq!(overview.last_7_days.summary().unwrap().total_records, 1);
        assert_eq!(overview.last_30_days.summary().unwrap().total_records, 2);
    }

    #[tokio::test]
    async fn unknown_user_has_no_overview() {
        let db = Database::in_memory().unwrap();
        assert!(user_overview(&db, 42, Utc::now()).await.unwrap().is_none());
    }
}
