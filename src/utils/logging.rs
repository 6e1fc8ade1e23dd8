//! Logging setup plus per-module switchable logging macros.
//!
//! A module opts into the macros by declaring its own switch:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("sampler window cleared");
//! ```
//! Setting the const to `false` silences that module without touching
//! `RUST_LOG`.

use log::LevelFilter;

/// Install `env_logger`, defaulting to `info`. `RUST_LOG` still wins.
/// Safe to call more than once.
pub fn init() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// `log::info!` gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
