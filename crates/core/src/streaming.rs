//! Unified Stream Event Types
//!
//! Provider-agnostic event types for processing real-time model responses.
//! These types are shared across the LLM crate (backend implementations) and
//! the main crate (agent loop, orchestrator).
//!
//! Control signals (approval pause, step banners, the step-limit sentinel)
//! travel as structured events alongside the text stream rather than as
//! string markers embedded in the prose, so callers never have to
//! pattern-match the text channel.

use serde::{Deserialize, Serialize};

/// Unified streaming event that all model backends and the agent loop emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text content delta from the model
    TextDelta { content: String },

    /// Reasoning/thinking content delta from the model
    ReasoningDelta { content: String },

    /// A mutating command is waiting for explicit human approval.
    /// The turn is paused; callers resume it via the confirm/reject API.
    ApprovalRequired {
        /// Human-readable description of the pending command
        description: String,
    },

    /// The agent loop started another autonomous step
    StepStarted { step: u32, max_steps: u32 },

    /// The agent loop hit its step cap with work still outstanding
    StepLimitReached { steps: u32 },

    /// Stream complete
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },

    /// Error during streaming
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event carries user-facing text.
    pub fn is_text(&self) -> bool {
        matches!(self, StreamEvent::TextDelta { .. })
    }

    /// Whether this event is a control signal rather than model content.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            StreamEvent::ApprovalRequired { .. }
                | StreamEvent::StepStarted { .. }
                | StreamEvent::StepLimitReached { .. }
        )
    }
}
