use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MAX_WINDOW_SIZE: usize = 120;

/// Tunable sampling, smoothing and recording thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplingConfig {
    /// Only every Nth frame reaches the classifier
    pub frame_stride: u32,

    /// Number of successful samples the stabilizer smooths over
    pub window_size: usize,

    /// Consecutive "no face" classifications tolerated before the reading
    /// falls back to undetected
    pub miss_threshold: u32,

    /// Throttled samples between two persisted records
    pub record_every: u64,

    /// Period of the detection loop
    pub tick_interval_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frame_stride: 5,
            window_size: 10,
            miss_threshold: 10,
            record_every: 30,
            tick_interval_ms: 100,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_stride == 0 {
            return Err(ConfigError::ZeroFrameStride);
        }
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::WindowSizeOutOfRange {
                got: self.window_size,
                max: MAX_WINDOW_SIZE,
            });
        }
        if self.record_every == 0 {
            return Err(ConfigError::ZeroRecordInterval);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}
