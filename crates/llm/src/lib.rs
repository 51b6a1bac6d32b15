//! Cellflow LLM
//!
//! Model-backend abstraction for the Cellflow workspace: conversation
//! message types, the channel-based streaming trait, and a deterministic
//! scripted backend for tests and dry runs.
//!
//! Concrete HTTP providers implement `ModelBackend` outside this workspace;
//! the control core never speaks a provider wire protocol itself.

pub mod provider;
pub mod scripted;
pub mod types;

pub use provider::ModelBackend;
pub use scripted::ScriptedBackend;
pub use types::{LlmError, LlmResult, Message, RequestOptions, Role};
