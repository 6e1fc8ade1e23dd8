mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use helpers::storage_precision;
pub use models::{ConversationMessage, EmotionRecord, MessageRole, NewUser, User};
pub use repositories::UserConflict;
