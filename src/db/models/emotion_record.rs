//! Persisted emotion history.
//!
//! An `EmotionRecord` is an immutable snapshot of a stabilized reading,
//! written by the history recorder and read back by the trend analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Emotion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRecord {
    /// Row id, `None` until inserted
    pub id: Option<i64>,
    pub user_id: i64,
    /// Detection session that produced the reading
    pub session_id: String,
    pub label: Emotion,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub context: Option<String>,
}
