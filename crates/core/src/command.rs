//! Tool Command Model
//!
//! A `ToolCommand` is one machine-readable instruction extracted from free-form
//! model output. The parser produces them in source order; the executor
//! consumes each one exactly once. Commands are immutable after creation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a command only reads from the workbook or mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Read-only operation, never recorded in the undo ledger
    Query,
    /// Mutating operation, recorded in the undo ledger before applying
    Action,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Query => write!(f, "query"),
            CommandKind::Action => write!(f, "action"),
        }
    }
}

/// One parsed tool call: a kind plus its structured JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub kind: CommandKind,
    pub payload: Value,
}

impl ToolCommand {
    /// Create a query command.
    pub fn query(payload: Value) -> Self {
        Self {
            kind: CommandKind::Query,
            payload,
        }
    }

    /// Create an action command.
    pub fn action(payload: Value) -> Self {
        Self {
            kind: CommandKind::Action,
            payload,
        }
    }

    /// The `operation` field of the payload, if present.
    pub fn operation(&self) -> Option<&str> {
        self.payload.get("operation").and_then(Value::as_str)
    }

    /// Whether executing this command would mutate the workbook.
    pub fn is_mutating(&self) -> bool {
        self.kind == CommandKind::Action
    }

    /// Short human-readable description, used in approval prompts and logs.
    pub fn describe(&self) -> String {
        match self.operation() {
            Some(op) => format!("{} `{}`", self.kind, op),
            None => format!("{} (no operation)", self.kind),
        }
    }
}
