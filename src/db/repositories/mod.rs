//! Table-specific queries, each as an `impl Database` block.

mod conversations;
mod emotion_records;
mod users;

pub use users::UserConflict;
