use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time window: `start <= t < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days leading up to (and excluding) `now`.
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}
