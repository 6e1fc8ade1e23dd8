use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::classifier::{EmotionClassifier, Frame};
use super::config::SamplingConfig;
use super::recorder::HistoryRecorder;
use super::sampler::{Observation, Sampler};
use crate::db::{Database, EmotionRecord};
use crate::error::ConfigError;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// What one refresh tick produced.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub observation: Observation,
    pub recorded: Option<EmotionRecord>,
}

/// Detection state owned by one user's running session.
pub struct DetectionSession<C> {
    user_id: i64,
    sampler: Sampler<C>,
    recorder: HistoryRecorder,
}

impl<C: EmotionClassifier> DetectionSession<C> {
    pub fn new(user_id: i64, classifier: C, config: &SamplingConfig) -> Result<Self, ConfigError> {
        let session_id = Uuid::new_v4().to_string();
        let sampler = Sampler::new(classifier, config)?;
        let recorder = HistoryRecorder::new(session_id, config)?;

        Ok(Self {
            user_id,
            sampler,
            recorder,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn session_id(&self) -> &str {
        self.recorder.session_id()
    }

    pub fn current(&self) -> Observation {
        self.sampler.current()
    }

    /// Observe one frame and persist the result when due. Storage failures
    /// are logged and swallowed so the caller's loop keeps running.
    pub async fn tick(&mut self, db: &Database, frame: &Frame, now: DateTime<Utc>) -> TickOutcome {
        let observation = self.sampler.observe(frame);

        let recorded = match self
            .recorder
            .maybe_record(db, self.user_id, &observation, now)
            .await
        {
            Ok(Some(record)) => {
                log_info!(
                    "recorded {} ({:.2}) for user {} in session {}",
                    record.label,
                    record.confidence,
                    self.user_id,
                    self.recorder.session_id()
                );
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                log_error!(
                    "failed to record emotion for user {}, will retry next interval: {err}",
                    self.user_id
                );
                None
            }
        };

        TickOutcome {
            observation,
            recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use crate::detection::classifier::Classification;
    use crate::error::ClassifierError;
    use crate::models::Emotion;
    use image::RgbImage;

    struct AlwaysHappy;

    impl EmotionClassifier for AlwaysHappy {
        fn classify(&self, _frame: &Frame) -> Result<Classification, ClassifierError> {
            Ok(Classification::Face {
                label: Emotion::Happy,
                confidence: 0.8,
            })
        }
    }

    async fn user(db: &Database) -> i64 {
        db.create_user(NewUser {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password_hash: "hash".into(),
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn default_cadence_records_every_150_frames() {
        let db = Database::in_memory().unwrap();
        let user_id = user(&db).await;
        let mut session =
            DetectionSession::new(user_id, AlwaysHappy, &SamplingConfig::default()).unwrap();

        let frame = Frame::new(RgbImage::new(2, 2), Utc::now());
        let mut recorded = 0;
        for _ in 0..300 {
            let outcome = session.tick(&db, &frame, Utc::now()).await;
            assert_eq!(outcome.observation.label(), Some(Emotion::Happy));
            if outcome.recorded.is_some() {
                recorded += 1;
            }
        }

        // Frames 0 and 150 classify as the 1st and 31st throttled samples.
        assert_eq!(recorded, 2);
        assert_eq!(db.count_emotion_records(user_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn storage_failure_does_not_stop_detection() {
        let db = Database::in_memory().unwrap();
        let user_id = user(&db).await;
        let mut session =
            DetectionSession::new(user_id, AlwaysHappy, &SamplingConfig::default()).unwrap();
        db.execute(|conn| {
            conn.execute_batch("DROP TABLE emotion_records")?;
            Ok(())
        })
        .await
        .unwrap();

        let frame = Frame::new(RgbImage::new(2, 2), Utc::now());
        for _ in 0..10 {
            let outcome = session.tick(&db, &frame, Utc::now()).await;
            assert!(outcome.recorded.is_none());
            assert!(outcome.observation.is_detected());
        }
        assert!(session.current().is_detected());
    }
}
