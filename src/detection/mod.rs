mod classifier;
mod config;
mod controller;
mod loop_worker;
mod recorder;
mod sampler;
mod session;
mod simulated;

pub use classifier::{Classification, EmotionClassifier, Frame, FrameSource};
pub use config::{SamplingConfig, MAX_WINDOW_SIZE};
pub use controller::DetectionController;
pub use recorder::{purge_user, HistoryRecorder};
pub use sampler::{EmotionSample, Observation, Sampler, StabilizedReading};
pub use session::{DetectionSession, TickOutcome};
pub use simulated::{SimulatedClassifier, SyntheticFrameSource};
