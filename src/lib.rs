pub mod accounts;
pub mod chat;
pub mod commands;
pub mod db;
pub mod detection;
pub mod error;
pub mod models;
pub mod settings;
pub mod trends;
mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::{info, warn};
use tokio::sync::Mutex;

use accounts::{AccountService, BcryptHasher, RegistrationForm, TokenIssuer};
use chat::ChatService;
use db::Database;
use detection::{
    DetectionController, DetectionSession, FrameSource, SimulatedClassifier, SyntheticFrameSource,
};
use models::TimeRange;
use settings::SettingsStore;

const DATA_DIR_ENV: &str = "MOODLENS_DATA_DIR";
const DEMO_TICKS_ENV: &str = "MOODLENS_DEMO_TICKS";
const DEFAULT_DATA_DIR: &str = "moodlens-data";
const DEFAULT_DEMO_TICKS: u64 = 600;
const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "DemoUser1";

/// Shared state behind every command.
pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub accounts: AccountService,
    pub chat: ChatService,
    pub detection: Mutex<DetectionController>,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: SettingsStore,
        accounts: AccountService,
        chat: ChatService,
    ) -> Self {
        Self {
            db,
            settings,
            accounts,
            chat,
            detection: Mutex::new(DetectionController::new()),
        }
    }

    /// Open (or create) the database and settings under `data_dir`.
    pub fn open(data_dir: PathBuf, accounts: AccountService, chat: ChatService) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let database = Database::new(data_dir.join("moodlens.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        Ok(Self::new(database, settings, accounts, chat))
    }
}

/// Run a simulated detection session for a local demo user and print the
/// resulting 7-day trend as JSON.
pub fn run() -> Result<()> {
    utils::logging::init();
    info!("moodlens starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_demo())
}

async fn run_demo() -> Result<()> {
    let data_dir = env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let ticks = demo_ticks();

    let account_service =
        AccountService::new(Arc::new(BcryptHasher::default()), TokenIssuer::from_env());
    let state = AppState::open(data_dir, account_service, ChatService::offline())?;
    let login = demo_login(&state).await?;
    let user = state.accounts.authenticate(&state.db, &login.access_token).await?;
    accounts::set_webcam_consent(&state.db, user.id, true).await?;
    accounts::require_webcam_consent(&state.db, user.id).await?;

    let config = state.settings.sampling();
    let mut session = DetectionSession::new(user.id, SimulatedClassifier::default(), &config)?;
    let mut source = SyntheticFrameSource::new();

    // Replay the ticks on a simulated clock that ends now.
    let step = Duration::from_std(std::time::Duration::from_millis(config.tick_interval_ms))
        .context("tick interval out of range")?;
    let span = i32::try_from(ticks)
        .ok()
        .and_then(|count| step.checked_mul(count))
        .context("too many demo ticks")?;
    let mut clock = Utc::now() - span;
    let mut recorded = 0u64;
    for _ in 0..ticks {
        let mut frame = source.capture()?;
        frame.captured_at = clock;
        if session.tick(&state.db, &frame, clock).await.recorded.is_some() {
            recorded += 1;
        }
        clock += step;
    }
    info!(
        "Demo session {} ran {ticks} ticks and recorded {recorded} readings",
        session.session_id()
    );

    let reply = state
        .chat
        .send_message(&state.db, user.id, "How am I doing today?", session.current(), Utc::now())
        .await?;
    info!("Companion: {}", reply.message.content);

    let range = TimeRange::last_days(7, Utc::now() + Duration::seconds(1));
    let trend = trends::summarize(&state.db, user.id, range).await?;
    println!("{}", serde_json::to_string_pretty(&trend)?);
    Ok(())
}

fn demo_ticks() -> u64 {
    match env::var(DEMO_TICKS_ENV) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {DEMO_TICKS_ENV}={value}, using {DEFAULT_DEMO_TICKS}");
            DEFAULT_DEMO_TICKS
        }),
        Err(_) => DEFAULT_DEMO_TICKS,
    }
}

/// Register the demo account on first use, then log in as it.
async fn demo_login(state: &AppState) -> Result<accounts::AuthSession> {
    if state.db.get_user_by_username(DEMO_USERNAME).await?.is_none() {
        state
            .accounts
            .register(
                &state.db,
                RegistrationForm {
                    username: DEMO_USERNAME.into(),
                    email: "demo@moodlens.local".into(),
                    password: DEMO_PASSWORD.into(),
                    confirm_password: DEMO_PASSWORD.into(),
                },
            )
            .await?;
    }

    let session = state
        .accounts
        .login(&state.db, DEMO_USERNAME, DEMO_PASSWORD, Utc::now())
        .await?;
    Ok(session)
}
