//! Throttled sampling and smoothing of per-frame classifier output.
//!
//! Only every `frame_stride`-th frame is classified. Successful samples go
//! into a sliding window; the current reading is the window's mode, with the
//! mean confidence of the samples that carry it. A run of more than
//! `miss_threshold` misses clears the window.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier::{Classification, EmotionClassifier, Frame};
use super::config::SamplingConfig;
use crate::error::ConfigError;
use crate::models::Emotion;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// One successful classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionSample {
    pub label: Emotion,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Smoothed, display-ready estimate of the current emotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizedReading {
    pub label: Emotion,
    pub confidence: f64,
    /// Samples currently in the window
    pub sample_count: usize,
    /// Classifier invocations made when this reading was produced
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Observation {
    Detected(StabilizedReading),
    Undetected,
}

impl Observation {
    pub fn reading(&self) -> Option<&StabilizedReading> {
        match self {
            Observation::Detected(reading) => Some(reading),
            Observation::Undetected => None,
        }
    }

    pub fn label(&self) -> Option<Emotion> {
        self.reading().map(|reading| reading.label)
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Observation::Detected(_))
    }
}

#[derive(Default)]
struct Tally {
    count: usize,
    last_index: usize,
    confidence_sum: f64,
}

pub struct Sampler<C> {
    classifier: C,
    frame_stride: u64,
    window_size: usize,
    miss_threshold: u32,
    window: VecDeque<EmotionSample>,
    frames_seen: u64,
    invocations: u64,
    consecutive_misses: u32,
    current: Observation,
}

impl<C: EmotionClassifier> Sampler<C> {
    pub fn new(classifier: C, config: &SamplingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            classifier,
            frame_stride: u64::from(config.frame_stride),
            window_size: config.window_size,
            miss_threshold: config.miss_threshold,
            window: VecDeque::with_capacity(config.window_size),
            frames_seen: 0,
            invocations: 0,
            consecutive_misses: 0,
            current: Observation::Undetected,
        })
    }

    /// Feed one frame. Frames between strides return the previous
    /// observation untouched; classifier failures count as misses.
    pub fn observe(&mut self, frame: &Frame) -> Observation {
        let frame_index = self.frames_seen;
        self.frames_seen += 1;

        if frame_index % self.frame_stride != 0 {
            return self.current;
        }

        self.invocations += 1;
        match self.classifier.classify(frame) {
            Ok(Classification::Face { label, confidence }) => {
                self.push_sample(EmotionSample {
                    label,
                    confidence: clamp_confidence(confidence),
                    timestamp: frame.captured_at,
                });
            }
            Ok(Classification::NoFace) => self.register_miss(),
            Err(err) => {
                log_warn!("classifier failed on frame {frame_index}, treating as no face: {err}");
                self.register_miss();
            }
        }

        self.current
    }

    pub fn current(&self) -> Observation {
        self.current
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Forget everything, as if detection had just started.
    pub fn reset(&mut self) {
        self.window.clear();
        self.frames_seen = 0;
        self.invocations = 0;
        self.consecutive_misses = 0;
        self.current = Observation::Undetected;
    }

    fn push_sample(&mut self, sample: EmotionSample) {
        self.consecutive_misses = 0;
        self.window.push_back(sample);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.current = self.stabilize();
    }

    fn register_miss(&mut self) {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);

        if self.consecutive_misses > self.miss_threshold {
            if !self.window.is_empty() {
                log_info!(
                    "no face for {} consecutive samples, clearing window",
                    self.consecutive_misses
                );
            }
            self.window.clear();
            self.current = Observation::Undetected;
        } else if let Observation::Detected(reading) = &mut self.current {
            reading.sequence = self.invocations;
        }
    }

    fn stabilize(&self) -> Observation {
        let mut tallies: BTreeMap<Emotion, Tally> = BTreeMap::new();
        for (index, sample) in self.window.iter().enumerate() {
            let tally = tallies.entry(sample.label).or_default();
            tally.count += 1;
            tally.last_index = index;
            tally.confidence_sum += sample.confidence;
        }

        // Equal counts go to the label seen most recently.
        tallies
            .into_iter()
            .max_by_key(|(_, tally)| (tally.count, tally.last_index))
            .map(|(label, tally)| {
                Observation::Detected(StabilizedReading {
                    label,
                    confidence: tally.confidence_sum / tally.count as f64,
                    sample_count: self.window.len(),
                    sequence: self.invocations,
                })
            })
            .unwrap_or(Observation::Undetected)
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
