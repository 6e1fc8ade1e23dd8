use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_emotion, to_i64, to_u64},
    models::EmotionRecord,
};
use crate::models::TimeRange;

fn row_to_emotion_record(row: &Row) -> Result<EmotionRecord> {
    let emotion: String = row.get("emotion")?;
    let timestamp: String = row.get("timestamp")?;

    Ok(EmotionRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        session_id: row.get("session_id")?,
        label: parse_emotion(&emotion)?,
        confidence: row.get("confidence")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        context: row.get("context")?,
    })
}

impl Database {
    /// Insert a record and return it with its row id filled in.
    pub async fn insert_emotion_record(&self, record: &EmotionRecord) -> Result<EmotionRecord> {
        let mut record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO emotion_records (user_id, session_id, emotion, confidence, timestamp, context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.user_id,
                    record.session_id,
                    record.label.as_str(),
                    record.confidence,
                    format_datetime(&record.timestamp),
                    record.context,
                ],
            )
            .with_context(|| "failed to insert emotion record")?;

            record.id = Some(conn.last_insert_rowid());
            Ok(record)
        })
        .await
    }

    /// Records for `user_id` whose timestamp falls in `range`, oldest first.
    pub async fn get_emotion_records_in_range(
        &self,
        user_id: i64,
        range: TimeRange,
    ) -> Result<Vec<EmotionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, session_id, emotion, confidence, timestamp, context
                 FROM emotion_records
                 WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp < ?3
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![
                user_id,
                format_datetime(&range.start),
                format_datetime(&range.end),
            ])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_emotion_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// The latest `limit` records, newest first.
    pub async fn get_recent_emotion_records(
        &self,
        user_id: i64,
        limit: u64,
    ) -> Result<Vec<EmotionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, session_id, emotion, confidence, timestamp, context
                 FROM emotion_records
                 WHERE user_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![user_id, to_i64(limit)?])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_emotion_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn count_emotion_records(&self, user_id: i64) -> Result<u64> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM emotion_records WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            to_u64(count, "emotion record count")
        })
        .await
    }

    /// Delete every emotion record of a user in one transaction. Returns the
    /// number of rows removed.
    pub async fn purge_user_emotions(&self, user_id: i64) -> Result<u64> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let deleted = tx
                .execute(
                    "DELETE FROM emotion_records WHERE user_id = ?1",
                    params![user_id],
                )
                .with_context(|| format!("failed to purge emotion records for user {user_id}"))?;

            tx.commit()?;
            Ok(deleted as u64)
        })
        .await
    }
}
