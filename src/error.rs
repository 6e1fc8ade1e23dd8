//! Error types at the core boundary.
//!
//! The db layer works in `anyhow::Result`; anything that leaves the recorder
//! or the trend analyzer is wrapped in [`StorageError`] so callers can tell a
//! retryable persistence failure apart from a bad configuration.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::db::UserConflict;

/// Failure reported by an emotion classifier. Never fatal: the sampler
/// downgrades it to a "no face" sample.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The frame could not be interpreted (empty, truncated, wrong format)
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The classifier backend itself failed
    #[error("classifier backend error: {0}")]
    Backend(String),
}

/// Insert/query/delete failure against the persistence store.
#[derive(Error, Debug)]
#[error("storage operation failed: {source:#}")]
pub struct StorageError {
    #[from]
    source: anyhow::Error,
}

impl StorageError {
    /// `false` when the store rejected the write on a constraint, which
    /// repeating the same write cannot fix.
    pub fn is_retryable(&self) -> bool {
        !self.source.chain().any(|cause| {
            cause.is::<UserConflict>()
                || matches!(
                    cause.downcast_ref::<rusqlite::Error>(),
                    Some(rusqlite::Error::SqliteFailure(failure, _))
                        if failure.code == ErrorCode::ConstraintViolation
                )
        })
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.source
    }
}

/// Invalid sampling parameters. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frame_stride must be at least 1")]
    ZeroFrameStride,

    #[error("window_size must be between 1 and {max} (got {got})")]
    WindowSizeOutOfRange { got: usize, max: usize },

    #[error("record_every must be at least 1")]
    ZeroRecordInterval,

    #[error("tick_interval_ms must be at least 1")]
    ZeroTickInterval,
}

/// Registration, login and consent failures.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password too weak: {0}")]
    WeakPassword(&'static str),

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("username is already taken")]
    UsernameTaken,

    #[error("email is already registered")]
    EmailTaken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    Inactive,

    #[error("webcam consent has not been given")]
    ConsentRequired,

    #[error("user {0} not found")]
    UnknownUser(i64),

    #[error("credential hashing failed: {0}")]
    Hashing(String),

    #[error("access token is invalid")]
    InvalidToken,

    #[error("access token has expired, please log in again")]
    TokenExpired,

    #[error("failed to sign access token: {0}")]
    TokenSigning(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        AccountError::Storage(StorageError::from(err))
    }
}

/// Failures of the companion chat.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Storage(StorageError::from(err))
    }
}
