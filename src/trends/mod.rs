mod overview;
mod summary;

pub use overview::{user_overview, UserOverview};
pub use summary::{
    direction, summarize, summarize_records, wellbeing_score, DailyEmotions, EmotionShare, Trend,
    TrendDirection, TrendSummary,
};
