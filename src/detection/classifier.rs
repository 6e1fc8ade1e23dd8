use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::error::ClassifierError;
use crate::models::Emotion;

/// One captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: DateTime<Utc>) -> Self {
        Self { image, captured_at }
    }

    /// Decode an encoded image (PNG, JPEG, ...) as delivered by a webcam
    /// bridge.
    pub fn decode(bytes: &[u8], captured_at: DateTime<Utc>) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode frame")?;
        Ok(Self::new(image.to_rgb8(), captured_at))
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Mean perceived brightness in [0, 1], `None` for an empty frame.
    pub fn mean_luma(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let total: f64 = self
            .image
            .pixels()
            .map(|pixel| {
                let [r, g, b] = pixel.0;
                0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
            })
            .sum();
        let count = f64::from(self.image.width()) * f64::from(self.image.height());
        Some(total / count / 255.0)
    }
}

/// Produces frames on demand.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame>;
}

/// Outcome of classifying one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    Face { label: Emotion, confidence: f64 },
    NoFace,
}

impl Classification {
    /// Pick the most probable label out of a per-emotion distribution. An
    /// empty distribution means no face was found.
    pub fn from_scores(scores: &[(Emotion, f64)]) -> Self {
        scores
            .iter()
            .copied()
            .filter(|(_, score)| score.is_finite())
            .fold(None, |best: Option<(Emotion, f64)>, candidate| match best {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            })
            .map(|(label, confidence)| Classification::Face { label, confidence })
            .unwrap_or(Classification::NoFace)
    }
}

/// Maps one frame to an emotion. Implementations wrap whatever face/emotion
/// model the host ships.
pub trait EmotionClassifier: Send {
    fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError>;
}
