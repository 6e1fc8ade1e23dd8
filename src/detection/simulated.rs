//! Stand-ins for a webcam and an emotion model, used by the demo binary and
//! by hosts without a camera.

use std::cell::RefCell;

use anyhow::Result;
use chrono::Utc;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::classifier::{Classification, EmotionClassifier, Frame, FrameSource};
use crate::error::ClassifierError;
use crate::models::Emotion;

const DEFAULT_WIDTH: u32 = 32;
const DEFAULT_HEIGHT: u32 = 24;
const MAX_BRIGHTNESS_STEP: f64 = 0.04;

/// Uniform grey frames whose brightness drifts in a bounded random walk.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    brightness: f64,
    rng: StdRng,
}

impl SyntheticFrameSource {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            brightness: 0.6,
            rng,
        }
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticFrameSource {
    fn capture(&mut self) -> Result<Frame> {
        let step = self.rng.gen_range(-MAX_BRIGHTNESS_STEP..=MAX_BRIGHTNESS_STEP);
        self.brightness = (self.brightness + step).clamp(0.0, 1.0);

        let level = (self.brightness * 255.0).round() as u8;
        let image = RgbImage::from_pixel(self.width, self.height, Rgb([level, level, level]));
        Ok(Frame::new(image, Utc::now()))
    }
}

/// Maps frame brightness to an emotion, with jitter and occasional misses.
pub struct SimulatedClassifier {
    jitter: f64,
    no_face_rate: f64,
    rng: RefCell<StdRng>,
}

impl SimulatedClassifier {
    pub fn new(jitter: f64, no_face_rate: f64) -> Self {
        Self::from_rng(jitter, no_face_rate, StdRng::from_entropy())
    }

    pub fn with_seed(jitter: f64, no_face_rate: f64, seed: u64) -> Self {
        Self::from_rng(jitter, no_face_rate, StdRng::seed_from_u64(seed))
    }

    fn from_rng(jitter: f64, no_face_rate: f64, rng: StdRng) -> Self {
        Self {
            jitter: jitter.max(0.0),
            no_face_rate: no_face_rate.clamp(0.0, 1.0),
            rng: RefCell::new(rng),
        }
    }
}

impl Default for SimulatedClassifier {
    fn default() -> Self {
        Self::new(0.1, 0.05)
    }
}

impl EmotionClassifier for SimulatedClassifier {
    fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError> {
        let Some(luma) = frame.mean_luma() else {
            return Err(ClassifierError::MalformedFrame(format!(
                "{}x{} frame",
                frame.image.width(),
                frame.image.height()
            )));
        };

        let mut rng = self.rng.borrow_mut();
        if rng.gen_bool(self.no_face_rate) {
            return Ok(Classification::NoFace);
        }

        let offset = if self.jitter > 0.0 {
            rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        let confidence = rng.gen_range(0.55..=0.95);

        Ok(Classification::Face {
            label: emotion_for_luma(luma + offset),
            confidence,
        })
    }
}

fn emotion_for_luma(luma: f64) -> Emotion {
    match luma {
        l if l >= 0.75 => Emotion::Happy,
        l if l >= 0.6 => Emotion::Surprise,
        l if l >= 0.4 => Emotion::Neutral,
        l if l >= 0.25 => Emotion::Sad,
        l if l >= 0.15 => Emotion::Fear,
        l if l >= 0.08 => Emotion::Angry,
        _ => Emotion::Disgust,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey(level: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(4, 4, Rgb([level, level, level])), Utc::now())
    }

    #[test]
    fn brightness_drives_the_label() {
        let classifier = SimulatedClassifier::with_seed(0.0, 0.0, 7);

        let bright = classifier.classify(&grey(250)).unwrap();
        assert!(matches!(bright, Classification::Face { label: Emotion::Happy, .. }));

        let dim = classifier.classify(&grey(80)).unwrap();
        assert!(matches!(dim, Classification::Face { label: Emotion::Sad, .. }));
    }

    #[test]
    fn confidence_stays_in_range() {
        let classifier = SimulatedClassifier::with_seed(0.1, 0.0, 11);
        for _ in 0..100 {
            if let Classification::Face { confidence, .. } = classifier.classify(&grey(128)).unwrap() {
                assert!((0.55..=0.95).contains(&confidence));
            }
        }
    }

    #[test]
    fn full_no_face_rate_never_sees_a_face() {
        let classifier = SimulatedClassifier::with_seed(0.0, 1.0, 3);
        assert_eq!(classifier.classify(&grey(200)).unwrap(), Classification::NoFace);
    }

    #[test]
    fn empty_frame_is_malformed() {
        let classifier = SimulatedClassifier::default();
        let frame = Frame::new(RgbImage::new(0, 0), Utc::now());
        assert!(matches!(
            classifier.classify(&frame),
            Err(ClassifierError::MalformedFrame(_))
        ));
    }

    #[test]
    fn synthetic_frames_are_bounded_and_reproducible() {
        let mut a = SyntheticFrameSource::with_seed(42);
        let mut b = SyntheticFrameSource::with_seed(42);

        for _ in 0..200 {
            let frame_a = a.capture().unwrap();
            let frame_b = b.capture().unwrap();
            assert_eq!(frame_a.image, frame_b.image);
            assert_eq!(frame_a.image.dimensions(), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
            assert!((0.0..=1.0).contains(&a.brightness()));
        }
    }
}
