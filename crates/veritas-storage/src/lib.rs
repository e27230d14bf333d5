//! Veritas Storage crate - per-user conversation logs.
//!
//! The [`ConversationStore`] trait is the only seam the answering engine
//! sees. [`JsonFileStore`] keeps one pretty-printed JSON file per user;
//! [`MemoryStore`] backs tests and one-shot CLI runs.

pub mod error;
pub mod json_file;
pub mod memory;
pub mod store;

pub use error::StorageError;
pub use json_file::{sanitize_user_id, JsonFileStore};
pub use memory::MemoryStore;
pub use store::ConversationStore;
