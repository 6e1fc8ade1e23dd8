mod backend;
mod offline;
mod service;

pub use backend::{tone_for, ChatBackend, ChatRequest, Tone};
pub use offline::OfflineResponder;
pub use service::{ChatReply, ChatService, HISTORY_WINDOW};
