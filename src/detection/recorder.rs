use chrono::{DateTime, Utc};

use super::config::SamplingConfig;
use super::sampler::{Observation, StabilizedReading};
use crate::db::{storage_precision, Database, EmotionRecord};
use crate::error::{ConfigError, StorageError};

/// Decides which stabilized readings become `EmotionRecord` rows.
///
/// The first detected reading of a session is written straight away; after
/// that a reading must be at least `record_every` throttled samples newer
/// than the last write. Undetected observations are never written.
pub struct HistoryRecorder {
    session_id: String,
    record_every: u64,
    last_recorded_sequence: Option<u64>,
}

impl HistoryRecorder {
    pub fn new(session_id: impl Into<String>, config: &SamplingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            session_id: session_id.into(),
            record_every: config.record_every,
            last_recorded_sequence: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The reading that would be written now, without writing it.
    pub fn due<'a>(&self, observation: &'a Observation) -> Option<&'a StabilizedReading> {
        let reading = observation.reading()?;
        match self.last_recorded_sequence {
            None => Some(reading),
            Some(last) if reading.sequence >= last.saturating_add(self.record_every) => {
                Some(reading)
            }
            Some(_) => None,
        }
    }

    /// Persist `observation` if it is due. Calls that are not due have no
    /// side effect and return `Ok(None)`.
    ///
    /// A failed write still uses up the interval; the next due reading is
    /// the retry.
    pub async fn maybe_record(
        &mut self,
        db: &Database,
        user_id: i64,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<Option<EmotionRecord>, StorageError> {
        let Some(reading) = self.due(observation).copied() else {
            return Ok(None);
        };

        self.last_recorded_sequence = Some(reading.sequence);

        let record = EmotionRecord {
            id: None,
            user_id,
            session_id: self.session_id.clone(),
            label: reading.label,
            confidence: reading.confidence,
            timestamp: storage_precision(now),
            context: None,
        };

        let stored = db.insert_emotion_record(&record).await?;
        Ok(Some(stored))
    }
}

/// Erase all emotion history of a user. All-or-nothing.
pub async fn purge_user(db: &Database, user_id: i64) -> Result<u64, StorageError> {
    Ok(db.purge_user_emotions(user_id).await?)
}
