//! Scripted Model Backend
//!
//! A deterministic `ModelBackend` that replays pre-recorded responses
//! chunk-by-chunk. Used by the agent-loop and orchestrator tests, and by the
//! demo binary as a dry-run model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cellflow_core::StreamEvent;

use crate::provider::ModelBackend;
use crate::types::{LlmError, LlmResult, Message, RequestOptions};

/// Replays scripted responses in order; repeats the last one when the script
/// runs out. Chunks are split on word boundaries to exercise incremental
/// delivery.
pub struct ScriptedBackend {
    responses: Vec<String>,
    calls: AtomicUsize,
    /// Artificial inter-chunk delay, zero by default.
    chunk_delay: Duration,
}

impl ScriptedBackend {
    /// Create a backend that replays the given responses in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
            chunk_delay: Duration::ZERO,
        }
    }

    /// Single fixed response for every call.
    pub fn single(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Add an artificial delay between chunks (for cancellation tests).
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Number of times `stream` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-v0"
    }

    async fn stream(
        &self,
        _messages: Vec<Message>,
        _system: Option<String>,
        _options: RequestOptions,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> LlmResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        let mut sent = String::new();
        for chunk in split_chunks(&response) {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            if !self.chunk_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = tokio::time::sleep(self.chunk_delay) => {}
                }
            }
            sent.push_str(chunk);
            let _ = tx
                .send(StreamEvent::TextDelta {
                    content: chunk.to_string(),
                })
                .await;
        }

        let _ = tx.send(StreamEvent::Done { stop_reason: None }).await;
        Ok(sent)
    }
}

/// Split text into small chunks on whitespace boundaries, keeping the
/// whitespace attached so concatenation reproduces the original.
fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_space = true;
        } else if in_space {
            chunks.push(&text[start..i]);
            start = i;
            in_space = false;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}
