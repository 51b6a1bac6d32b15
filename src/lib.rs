//! Cellflow - Spreadsheet Agent Control Core
//!
//! Library crate wiring the control loop of an autonomous spreadsheet
//! agent:
//! - Command parsing of model output into typed tool calls
//! - Tool execution with automatic undo capture
//! - The bounded agent loop with approval gating and cancellation
//! - An optional parallel orchestrator (worker pool, tagged cache,
//!   failure memoization, adaptive modes)
//! - Storage layer (SQLite conversation and undo persistence)

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::{OperationMode, Priority, Task, TaskResult, UndoAction, UndoOperation};
pub use services::{
    parse_commands, AgentConfig, AgentLoop, Orchestrator, StoreLedger, ToolExecutor, UndoLedger,
};
pub use storage::{ConversationStore, MemoryStore, SqliteStore};
pub use utils::error::{AppError, AppResult};
