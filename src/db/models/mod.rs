pub mod conversation;
pub mod emotion_record;
pub mod user;

pub use conversation::{ConversationMessage, MessageRole};
pub use emotion_record::EmotionRecord;
pub use user::{NewUser, User};
