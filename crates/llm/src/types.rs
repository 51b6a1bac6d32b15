//! Model Backend Types
//!
//! Core types for model-backend interactions: conversation messages and
//! per-request options.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One conversation message. Messages are append-only per conversation;
/// system, hidden, and tool-result messages are filtered at presentation
/// time, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// ISO 8601 creation timestamp
    pub timestamp: String,
    /// Hidden messages carry loop-internal context (tool results) and are
    /// excluded from user-facing rendering.
    #[serde(default)]
    pub hidden: bool,
    /// Correlates a tool-result message with the call that produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
            hidden: false,
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a hidden tool-result message fed back to the model as context.
    pub fn tool_result(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        Self {
            hidden: true,
            tool_call_id,
            ..Self::new(Role::User, content)
        }
    }

    /// Whether this message should appear in user-facing rendering.
    pub fn is_visible(&self) -> bool {
        !self.hidden && self.role != Role::System && self.tool_call_id.is_none()
    }
}

/// Per-request options: the "cognitive budget" granted to a model call.
/// Scaled down by the orchestrator under degraded health.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens the model may generate
    pub max_tokens: u32,
    /// Whether to request extended reasoning output
    pub include_reasoning: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            include_reasoning: true,
        }
    }
}

/// Errors from model backends
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },

    /// The stream was cancelled by the caller
    #[error("Stream cancelled")]
    Cancelled,

    /// Response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for model-backend errors
pub type LlmResult<T> = Result<T, LlmError>;

impl LlmError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::RateLimited { .. })
    }
}
