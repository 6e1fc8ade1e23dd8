use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::classifier::{EmotionClassifier, FrameSource};
use super::sampler::Observation;
use super::session::DetectionSession;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub async fn detection_loop<C, F>(
    mut session: DetectionSession<C>,
    mut source: F,
    db: Database,
    tick_interval: Duration,
    observation_tx: watch::Sender<Observation>,
    cancel_token: CancellationToken,
) where
    C: EmotionClassifier,
    F: FrameSource,
{
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "detection loop started for user {} (session {}, every {}ms)",
        session.user_id(),
        session.session_id(),
        tick_interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tick_start = Instant::now();

                let frame = match source.capture() {
                    Ok(frame) => frame,
                    Err(err) => {
                        log_warn!("frame capture failed for session {}: {err:#}", session.session_id());
                        continue;
                    }
                };

                let outcome = session.tick(&db, &frame, Utc::now()).await;
                observation_tx.send_replace(outcome.observation);

                let elapsed = tick_start.elapsed();
                if elapsed > tick_interval {
                    log_warn!(
                        "detection tick took {}ms (> {}ms) in session {}",
                        elapsed.as_millis(),
                        tick_interval.as_millis(),
                        session.session_id()
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("detection loop shutting down for session {}", session.session_id());
                break;
            }
        }
    }
}
