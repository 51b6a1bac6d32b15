//! Task Models
//!
//! Data structures for orchestrator task submission and results.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use cellflow_core::CommandKind;

/// Scheduling priority. Lower value dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Urgent = 1,
    Normal = 2,
    Low = 3,
}

/// A unit of work submitted to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (UUID)
    pub id: String,
    /// Query or action
    pub kind: CommandKind,
    /// Catalog operation name
    pub tool_name: String,
    /// Operation arguments as sent to the executor
    pub arguments: Value,
    pub priority: Priority,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

impl Task {
    pub fn new(
        kind: CommandKind,
        tool_name: impl Into<String>,
        arguments: Value,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            tool_name: tool_name.into(),
            arguments,
            priority,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Convenience constructor for a read-only task at normal priority
    pub fn query(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self::new(CommandKind::Query, tool_name, arguments, Priority::Normal)
    }

    /// Convenience constructor for a mutating task at normal priority
    pub fn action(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self::new(CommandKind::Action, tool_name, arguments, Priority::Normal)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_mutating(&self) -> bool {
        self.kind == CommandKind::Action
    }
}

/// Outcome of one orchestrated task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// True when served from the result cache without executor involvement
    #[serde(default)]
    pub from_cache: bool,
}

impl TaskResult {
    pub fn ok(task_id: impl Into<String>, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms,
            from_cache: false,
        }
    }

    pub fn err(task_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
            from_cache: false,
        }
    }

    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
