//! Storage Layer
//!
//! Conversation and undo persistence: the `ConversationStore` trait, an
//! in-memory implementation, and the pooled SQLite store.

pub mod database;
pub mod store;

pub use database::*;
pub use store::*;
