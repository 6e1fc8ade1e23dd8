//! Operations exposed to a host UI. Every command reports failures as a
//! display string. Per-user commands take the access token returned by
//! [`login`] and act on the account it was issued for.

use chrono::Utc;

use crate::{
    accounts::{self, AuthSession, RegistrationForm},
    chat::ChatReply,
    db::{ConversationMessage, EmotionRecord, User},
    detection::{purge_user, EmotionClassifier, FrameSource, Observation, SamplingConfig},
    models::TimeRange,
    trends::{self, Trend, UserOverview},
    AppState,
};

const MAX_TREND_DAYS: u32 = 365;

async fn authorize(state: &AppState, token: &str) -> Result<User, String> {
    state
        .accounts
        .authenticate(&state.db, token)
        .await
        .map_err(|e| e.to_string())
}

pub async fn register_user(state: &AppState, form: RegistrationForm) -> Result<User, String> {
    state
        .accounts
        .register(&state.db, form)
        .await
        .map_err(|e| e.to_string())
}

pub async fn login(
    state: &AppState,
    username: String,
    password: String,
) -> Result<AuthSession, String> {
    state
        .accounts
        .login(&state.db, &username, &password, Utc::now())
        .await
        .map_err(|e| e.to_string())
}

pub fn validate_token(state: &AppState, token: String) -> bool {
    state.accounts.is_token_valid(&token)
}

/// Withdrawing consent stops the caller's detection loop. The detection lock
/// is held across the update so a concurrent start sees the new consent.
pub async fn set_webcam_consent(
    state: &AppState,
    token: String,
    consent: bool,
) -> Result<User, String> {
    let user = authorize(state, &token).await?;

    let mut detection = state.detection.lock().await;
    if !consent && detection.active_user() == Some(user.id) {
        detection.stop().await.map_err(|e| format!("{e:#}"))?;
    }
    accounts::set_webcam_consent(&state.db, user.id, consent)
        .await
        .map_err(|e| e.to_string())
}

/// Start the background detection loop for a user who agreed to webcam use.
/// Returns the new session id.
pub async fn start_detection<C, F>(
    state: &AppState,
    token: String,
    classifier: C,
    source: F,
) -> Result<String, String>
where
    C: EmotionClassifier + 'static,
    F: FrameSource + 'static,
{
    let user = authorize(state, &token).await?;

    let mut detection = state.detection.lock().await;
    accounts::require_webcam_consent(&state.db, user.id)
        .await
        .map_err(|e| e.to_string())?;

    let config = state.settings.sampling();
    detection
        .start(user.id, classifier, source, &config, state.db.clone())
        .map_err(|e| format!("{e:#}"))
}

/// Stop the caller's detection loop. A loop owned by another user is left alone.
pub async fn stop_detection(state: &AppState, token: String) -> Result<(), String> {
    let user = authorize(state, &token).await?;

    let mut detection = state.detection.lock().await;
    match detection.active_user() {
        Some(active) if active != user.id => Err("detection is running for another user".into()),
        _ => detection.stop().await.map_err(|e| format!("{e:#}")),
    }
}

async fn current_observation(state: &AppState, user_id: i64) -> Observation {
    let detection = state.detection.lock().await;
    if detection.active_user() == Some(user_id) {
        detection.current_observation()
    } else {
        Observation::Undetected
    }
}

/// Current stabilized emotion of the caller; `Undetected` unless their
/// detection loop is running.
pub async fn get_current_emotion(state: &AppState, token: String) -> Result<Observation, String> {
    let user = authorize(state, &token).await?;
    Ok(current_observation(state, user.id).await)
}

pub async fn get_emotion_trend(state: &AppState, token: String, days: u32) -> Result<Trend, String> {
    if days == 0 || days > MAX_TREND_DAYS {
        return Err(format!("days must be between 1 and {MAX_TREND_DAYS}"));
    }
    let user = authorize(state, &token).await?;
    let range = TimeRange::last_days(i64::from(days), Utc::now());
    trends::summarize(&state.db, user.id, range)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_emotion_trend_in_range(
    state: &AppState,
    token: String,
    range: TimeRange,
) -> Result<Trend, String> {
    if range.end < range.start {
        return Err("range end is before its start".into());
    }
    let user = authorize(state, &token).await?;
    trends::summarize(&state.db, user.id, range)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_recent_emotions(
    state: &AppState,
    token: String,
    limit: u64,
) -> Result<Vec<EmotionRecord>, String> {
    let user = authorize(state, &token).await?;
    state
        .db
        .get_recent_emotion_records(user.id, limit)
        .await
        .map_err(|e| e.to_string())
}

pub async fn purge_emotion_history(state: &AppState, token: String) -> Result<u64, String> {
    let user = authorize(state, &token).await?;
    purge_user(&state.db, user.id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_user_overview(state: &AppState, token: String) -> Result<UserOverview, String> {
    let user = authorize(state, &token).await?;
    trends::user_overview(&state.db, user.id, Utc::now())
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("user {} not found", user.id))
}

pub async fn send_chat_message(
    state: &AppState,
    token: String,
    message: String,
) -> Result<ChatReply, String> {
    let user = authorize(state, &token).await?;
    let observation = current_observation(state, user.id).await;
    state
        .chat
        .send_message(&state.db, user.id, &message, observation, Utc::now())
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_chat_history(
    state: &AppState,
    token: String,
    limit: u64,
) -> Result<Vec<ConversationMessage>, String> {
    let user = authorize(state, &token).await?;
    state
        .chat
        .history(&state.db, user.id, limit)
        .await
        .map_err(|e| e.to_string())
}

pub async fn clear_chat_history(state: &AppState, token: String) -> Result<u64, String> {
    let user = authorize(state, &token).await?;
    state
        .chat
        .clear_history(&state.db, user.id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_greeting(state: &AppState, token: String) -> Result<String, String> {
    let user = authorize(state, &token).await?;
    let observation = current_observation(state, user.id).await;
    Ok(state.chat.responder().greeting(observation.label()).to_string())
}

pub async fn get_wellness_tip(state: &AppState, token: String) -> Result<String, String> {
    let user = authorize(state, &token).await?;
    let observation = current_observation(state, user.id).await;
    Ok(state.chat.responder().wellness_tip(observation.label()))
}

pub fn get_sampling_settings(state: &AppState) -> Result<SamplingConfig, String> {
    Ok(state.settings.sampling())
}

/// Takes effect the next time detection starts.
pub fn set_sampling_settings(state: &AppState, settings: SamplingConfig) -> Result<(), String> {
    state
        .settings
        .update_sampling(settings)
        .map_err(|e| format!("{e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountService, BcryptHasher, TokenIssuer};
    use crate::chat::ChatService;
    use crate::db::Database;
    use crate::detection::{Classification, Frame};
    use crate::error::ClassifierError;
    use crate::models::Emotion;
    use crate::settings::SettingsStore;
    use image::RgbImage;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::Duration;

    struct AlwaysHappy;

    impl EmotionClassifier for AlwaysHappy {
        fn classify(&self, _frame: &Frame) -> Result<Classification, ClassifierError> {
            Ok(Classification::Face {
                label: Emotion::Happy,
                confidence: 0.9,
            })
        }
    }

    struct BlankSource;

    impl FrameSource for BlankSource {
        fn capture(&mut self) -> anyhow::Result<Frame> {
            Ok(Frame::new(RgbImage::new(2, 2), Utc::now()))
        }
    }

    fn state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let accounts = AccountService::new(
            Arc::new(BcryptHasher::with_cost(4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */)),
            TokenIssuer::new(b"test-secret"),
        );
        let state = AppState::new(
            Database::in_memory().unwrap(),
            settings,
            accounts,
            ChatService::offline(),
        );
        (state, dir)
    }

    async fn signed_in(state: &AppState, name: &str) -> AuthSession {
        register_user(
            state,
            RegistrationForm {
                username: name.into(),
                email: format!("{name}@example.com"),
                password: "Secret123".into(),
                confirm_password: "Secret123".into(),
            },
        )
        .await
        .unwrap();
        login(state, name.into(), "Secret123".into()).await.unwrap()
    }

    fn sad_record(user_id: i64) -> EmotionRecord {
        EmotionRecord {
            id: None,
            user_id,
            session_id: "s".into(),
            label: Emotion::Sad,
            confidence: 0.6,
            timestamp: Utc::now() - chrono::Duration::hours(1),
            context: None,
        }
    }

    #[tokio::test]
    async fn detection_needs_consent() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;

        let err = start_detection(&state, ana.access_token, AlwaysHappy, BlankSource)
            .await
            .unwrap_err();
        assert!(err.contains("consent"));
    }

    #[tokio::test]
    async fn detect_chat_and_summarize() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let token = ana.access_token.clone();
        set_webcam_consent(&state, token.clone(), true).await.unwrap();
        set_sampling_settings(
            &state,
            SamplingConfig {
                frame_stride: 1,
                tick_interval_ms: 5,
                ..SamplingConfig::default()
            },
        )
        .unwrap();

        start_detection(&state, token.clone(), AlwaysHappy, BlankSource)
            .await
            .unwrap();
        let mut rx = state.detection.lock().await.subscribe().unwrap();
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();

        let current = get_current_emotion(&state, token.clone()).await.unwrap();
        assert_eq!(current.label(), Some(Emotion::Happy));

        let reply = send_chat_message(&state, token.clone(), "hi there".into())
            .await
            .unwrap();
        assert_eq!(reply.message.emotion_context, Some(Emotion::Happy));

        stop_detection(&state, token.clone()).await.unwrap();

        let trend = get_emotion_trend(&state, token.clone(), 7).await.unwrap();
        assert_eq!(trend.summary().unwrap().dominant_emotion, Emotion::Happy);

        let overview = get_user_overview(&state, token.clone()).await.unwrap();
        assert_eq!(overview.total_messages, 2);

        let recent = get_recent_emotions(&state, token, 5).await.unwrap();
        assert!(!recent.is_empty());
    }

    #[tokio::test]
    async fn purge_clears_the_trend() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        state.db.insert_emotion_record(&sad_record(ana.user.id)).await.unwrap();

        assert_eq!(
            purge_emotion_history(&state, ana.access_token.clone()).await.unwrap(),
            1
        );
        let trend = get_emotion_trend(&state, ana.access_token, 7).await.unwrap();
        assert!(trend.summary().is_none());
    }

    #[tokio::test]
    async fn commands_act_only_on_the_token_owner() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let bea = signed_in(&state, "bea").await;
        state.db.insert_emotion_record(&sad_record(ana.user.id)).await.unwrap();

        assert_eq!(purge_emotion_history(&state, bea.access_token).await.unwrap(), 0);
        assert_eq!(state.db.count_emotion_records(ana.user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn user_commands_reject_missing_or_forged_tokens() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        state.db.insert_emotion_record(&sad_record(ana.user.id)).await.unwrap();

        let foreign = TokenIssuer::new(b"other-secret")
            .issue(&ana.user, Utc::now())
            .unwrap()
            .0;
        for token in [String::new(), "garbage".to_string(), foreign] {
            assert!(!validate_token(&state, token.clone()));
            assert!(purge_emotion_history(&state, token.clone()).await.is_err());
            assert!(get_emotion_trend(&state, token.clone(), 7).await.is_err());
            assert!(set_webcam_consent(&state, token, true).await.is_err());
        }
        assert_eq!(state.db.count_emotion_records(ana.user.id).await.unwrap(), 1);
        assert!(validate_token(&state, ana.access_token));
    }

    #[tokio::test]
    async fn expired_token_asks_to_log_in_again() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let expired = TokenIssuer::new(b"test-secret")
            .issue(&ana.user, Utc::now() - chrono::Duration::hours(25))
            .unwrap()
            .0;

        let err = get_recent_emotions(&state, expired, 5).await.unwrap_err();
        assert!(err.contains("expired"));
    }

    #[tokio::test]
    async fn withdrawing_consent_stops_detection() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        set_webcam_consent(&state, ana.access_token.clone(), true)
            .await
            .unwrap();
        start_detection(&state, ana.access_token.clone(), AlwaysHappy, BlankSource)
            .await
            .unwrap();

        set_webcam_consent(&state, ana.access_token, false).await.unwrap();
        assert!(!state.detection.lock().await.is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_racing_a_consent_withdrawal_never_outlives_it() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let token = ana.access_token.clone();

        for _ in 0..20 {
            set_webcam_consent(&state, token.clone(), true).await.unwrap();
            let (_started, withdrawn) = tokio::join!(
                start_detection(&state, token.clone(), AlwaysHappy, BlankSource),
                set_webcam_consent(&state, token.clone(), false),
            );
            withdrawn.unwrap();

            let stored = state.db.get_user_by_id(ana.user.id).await.unwrap().unwrap();
            let active = state.detection.lock().await.is_active();
            assert!(!stored.consent_webcam);
            assert!(!active, "detection kept running after consent was withdrawn");
            stop_detection(&state, token.clone()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn another_users_loop_cannot_be_stopped() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let bea = signed_in(&state, "bea").await;
        set_webcam_consent(&state, ana.access_token.clone(), true)
            .await
            .unwrap();
        start_detection(&state, ana.access_token.clone(), AlwaysHappy, BlankSource)
            .await
            .unwrap();

        assert!(stop_detection(&state, bea.access_token.clone()).await.is_err());
        assert!(state.detection.lock().await.is_active());
        assert_eq!(
            get_current_emotion(&state, bea.access_token).await.unwrap(),
            Observation::Undetected
        );
        stop_detection(&state, ana.access_token).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_bad_arguments() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        assert!(get_emotion_trend(&state, ana.access_token, 0).await.is_err());
        assert!(set_sampling_settings(
            &state,
            SamplingConfig {
                window_size: 0,
                ..SamplingConfig::default()
            }
        )
        .is_err());
    }

    #[tokio::test]
    async fn greeting_without_detection_is_neutral() {
        let (state, _dir) = state();
        let ana = signed_in(&state, "ana").await;
        let greeting = get_greeting(&state, ana.access_token).await.unwrap();
        assert_eq!(greeting, state.chat.responder().greeting(None));
    }
}
