use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

/// The fixed vocabulary every classifier result and stored record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Neutral,
    Surprise,
    Fear,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Neutral,
        Emotion::Surprise,
        Emotion::Fear,
        Emotion::Disgust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Neutral => "neutral",
            Emotion::Surprise => "surprise",
            Emotion::Fear => "fear",
            Emotion::Disgust => "disgust",
        }
    }

    /// Polarity used by the well-being score and trend direction.
    ///
    /// | label    | weight |
    /// |----------|--------|
    /// | happy    | +1     |
    /// | surprise | +1     |
    /// | neutral  |  0     |
    /// | sad      | -1     |
    /// | angry    | -1     |
    /// | fear     | -1     |
    /// | disgust  | -1     |
    pub fn wellbeing_weight(&self) -> i64 {
        match self {
            Emotion::Happy | Emotion::Surprise => 1,
            Emotion::Neutral => 0,
            Emotion::Sad | Emotion::Angry | Emotion::Fear | Emotion::Disgust => -1,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            "neutral" => Ok(Emotion::Neutral),
            "surprise" => Ok(Emotion::Surprise),
            "fear" => Ok(Emotion::Fear),
            "disgust" => Ok(Emotion::Disgust),
            other => Err(anyhow!("unknown emotion label '{other}'")),
        }
    }
}
