pub mod emotion;
pub mod time_range;

pub use emotion::Emotion;
pub use time_range::TimeRange;
