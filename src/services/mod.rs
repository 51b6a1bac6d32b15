//! Services
//!
//! Business logic: command parsing, tool execution, the undo ledger, the
//! bounded agent loop, and the optional parallel orchestrator.

pub mod agent;
pub mod executor;
pub mod orchestrator;
pub mod parser;
pub mod undo;

pub use agent::{AgentConfig, AgentLoop, EventSink};
pub use executor::ToolExecutor;
pub use orchestrator::Orchestrator;
pub use parser::parse_commands;
pub use undo::{apply_inverse, StoreLedger, UndoLedger, UndoOutcome};
