use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::models::Emotion;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width UTC form (`2024-03-01T09:30:00.000000Z`) so that comparing the
/// stored TEXT columns orders them the same way as the instants.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop precision SQLite will not keep, so a value reads back unchanged.
pub fn storage_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_emotion(value: &str) -> Result<Emotion> {
    value
        .parse::<Emotion>()
        .with_context(|| "stored emotion is outside the vocabulary")
}

pub fn parse_optional_emotion(value: Option<String>) -> Result<Option<Emotion>> {
    value.as_deref().map(parse_emotion).transpose()
}
