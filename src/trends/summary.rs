use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Database, EmotionRecord};
use crate::error::StorageError;
use crate::models::{Emotion, TimeRange};

/// Mean weight change between the two halves of a range that counts as a
/// trend rather than noise.
const DIRECTION_THRESHOLD: f64 = 0.2;
const MIN_RECORDS_FOR_DIRECTION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionShare {
    pub count: u64,
    /// Share of all records in the range, 0-100, one decimal
    pub percentage: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEmotions {
    pub date: NaiveDate,
    pub total_records: u64,
    pub counts: BTreeMap<Emotion, u64>,
    pub dominant_emotion: Emotion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub time_range: TimeRange,
    pub total_records: u64,
    pub distribution: BTreeMap<Emotion, EmotionShare>,
    pub dominant_emotion: Emotion,
    pub wellbeing_score: f64,
    pub direction: TrendDirection,
    pub daily: Vec<DailyEmotions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Trend {
    NoData {
        #[serde(rename = "timeRange")]
        time_range: TimeRange,
    },
    Summary(TrendSummary),
}

impl Trend {
    pub fn summary(&self) -> Option<&TrendSummary> {
        match self {
            Trend::Summary(summary) => Some(summary),
            Trend::NoData { .. } => None,
        }
    }

    pub fn wellbeing_score(&self) -> Option<f64> {
        self.summary().map(|summary| summary.wellbeing_score)
    }
}

/// Summarize a user's stored history over `range`.
pub async fn summarize(db: &Database, user_id: i64, range: TimeRange) -> Result<Trend, StorageError> {
    let records = db.get_emotion_records_in_range(user_id, range).await?;
    Ok(summarize_records(&records, range))
}

/// Pure summary of `records`; entries outside `range` are ignored.
pub fn summarize_records(records: &[EmotionRecord], range: TimeRange) -> Trend {
    let mut in_range: Vec<&EmotionRecord> = records
        .iter()
        .filter(|record| range.contains(record.timestamp))
        .collect();
    if in_range.is_empty() {
        return Trend::NoData { time_range: range };
    }
    in_range.sort_by_key(|record| (record.timestamp, record.id));

    let labels: Vec<Emotion> = in_range.iter().map(|record| record.label).collect();
    let total = in_range.len() as u64;

    let mut confidence_sums: BTreeMap<Emotion, (u64, f64)> = BTreeMap::new();
    for record in &in_range {
        let entry = confidence_sums.entry(record.label).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.confidence;
    }
    let distribution = confidence_sums
        .into_iter()
        .map(|(label, (count, sum))| {
            let share = EmotionShare {
                count,
                percentage: round_to(count as f64 * 100.0 / total as f64, 1),
                avg_confidence: round_to(sum / count as f64, 2),
            };
            (label, share)
        })
        .collect();

    let Some(dominant_emotion) = dominant(&labels) else {
        return Trend::NoData { time_range: range };
    };

    Trend::Summary(TrendSummary {
        time_range: range,
        total_records: total,
        distribution,
        dominant_emotion,
        wellbeing_score: wellbeing_score(&labels),
        direction: direction(&labels),
        daily: daily_breakdown(&in_range),
    })
}

/// `50 * (total + net) / total`, where `net` sums the label weights. Ranges
/// from 0 (all negative) through 50 (balanced) to 100 (all positive).
pub fn wellbeing_score(labels: &[Emotion]) -> f64 {
    if labels.is_empty() {
        return 50.0;
    }
    let total = labels.len() as i64;
    let net: i64 = labels.iter().map(|label| label.wellbeing_weight()).sum();
    (50 * (total + net)) as f64 / total as f64
}

/// Compare the mean weight of the later half of `labels` (chronological)
/// with the earlier half. With an odd count the middle entry belongs to the
/// later half.
pub fn direction(labels: &[Emotion]) -> TrendDirection {
    if labels.len() < MIN_RECORDS_FOR_DIRECTION {
        return TrendDirection::Stable;
    }

    let (earlier, later) = labels.split_at(labels.len() / 2);
    let delta = mean_weight(later) - mean_weight(earlier);

    if delta > DIRECTION_THRESHOLD {
        TrendDirection::Improving
    } else if delta < -DIRECTION_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

fn mean_weight(labels: &[Emotion]) -> f64 {
    let sum: i64 = labels.iter().map(|label| label.wellbeing_weight()).sum();
    sum as f64 / labels.len() as f64
}

/// Most frequent label; equal counts go to the one that occurred last.
fn dominant(labels: &[Emotion]) -> Option<Emotion> {
    let mut tally: BTreeMap<Emotion, (usize, usize)> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        let entry = tally.entry(*label).or_insert((0, index));
        entry.0 += 1;
        entry.1 = index;
    }

    tally
        .into_iter()
        .max_by_key(|(_, count_and_last)| *count_and_last)
        .map(|(label, _)| label)
}

fn daily_breakdown(records: &[&EmotionRecord]) -> Vec<DailyEmotions> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Emotion>> = BTreeMap::new();
    for record in records {
        by_day
            .entry(record.timestamp.date_naive())
            .or_default()
            .push(record.label);
    }

    by_day
        .into_iter()
        .filter_map(|(date, labels)| {
            let dominant_emotion = dominant(&labels)?;
            let mut counts = BTreeMap::new();
            for label in &labels {
                *counts.entry(*label).or_insert(0u64) += 1;
            }
            Some(DailyEmotions {
                date,
                total_records: labels.len() as u64,
                counts,
                dominant_emotion,
            })
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
