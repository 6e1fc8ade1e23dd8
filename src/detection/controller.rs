use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::classifier::{EmotionClassifier, FrameSource};
use super::config::SamplingConfig;
use super::loop_worker::detection_loop;
use super::sampler::Observation;
use super::session::DetectionSession;

struct ActiveDetection {
    user_id: i64,
    session_id: String,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    observation_rx: watch::Receiver<Observation>,
}

/// Runs at most one background detection loop at a time.
#[derive(Default)]
pub struct DetectionController {
    active: Option<ActiveDetection>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the detection loop for `user_id`. Returns the new session id.
    pub fn start<C, F>(
        &mut self,
        user_id: i64,
        classifier: C,
        source: F,
        config: &SamplingConfig,
        db: Database,
    ) -> Result<String>
    where
        C: EmotionClassifier + 'static,
        F: FrameSource + 'static,
    {
        if let Some(active) = &self.active {
            bail!("detection already active for user {}", active.user_id);
        }

        let session = DetectionSession::new(user_id, classifier, config)
            .context("invalid sampling configuration")?;
        let session_id = session.session_id().to_string();

        let cancel_token = CancellationToken::new();
        let (observation_tx, observation_rx) = watch::channel(Observation::Undetected);

        let handle = tokio::spawn(detection_loop(
            session,
            source,
            db,
            Duration::from_millis(config.tick_interval_ms),
            observation_tx,
            cancel_token.clone(),
        ));

        info!("Started detection session {session_id} for user {user_id}");
        self.active = Some(ActiveDetection {
            user_id,
            session_id: session_id.clone(),
            handle,
            cancel_token,
            observation_rx,
        });
        Ok(session_id)
    }

    pub async fn stop(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        active.cancel_token.cancel();
        active
            .handle
            .await
            .context("detection loop task failed to join")?;
        info!("Stopped detection session {}", active.session_id);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_user(&self) -> Option<i64> {
        self.active.as_ref().map(|active| active.user_id)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.session_id.as_str())
    }

    /// Latest observation of the running loop; `Undetected` when idle.
    pub fn current_observation(&self) -> Observation {
        self.active
            .as_ref()
            .map(|active| *active.observation_rx.borrow())
            .unwrap_or(Observation::Undetected)
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<Observation>> {
        self.active
            .as_ref()
            .map(|active| active.observation_rx.clone())
    }
}
