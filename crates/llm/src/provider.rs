//! Model Backend Trait
//!
//! Defines the common interface every model backend implements. The agent
//! loop consumes a cancelable sequence of typed `StreamEvent`s over a
//! channel; the backend returns the accumulated final text once the stream
//! ends.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cellflow_core::StreamEvent;

use crate::types::{LlmResult, Message, RequestOptions};

/// Common interface for all model backends.
///
/// Implementations must:
/// - forward every chunk as a `StreamEvent` the moment it arrives (no
///   buffering delay);
/// - emit `StreamEvent::Done` exactly once on normal completion;
/// - return promptly with `LlmError::Cancelled` when the token fires.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Returns the backend name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Stream a response for the given conversation.
    ///
    /// # Arguments
    /// * `messages` - Conversation history
    /// * `system` - Optional system prompt
    /// * `options` - Token budget and reasoning flags for this call
    /// * `tx` - Channel sender for streaming events
    /// * `cancel` - Cancellation token tied to the current turn
    ///
    /// # Returns
    /// Final complete text after streaming.
    async fn stream(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        options: RequestOptions,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> LlmResult<String>;
}
