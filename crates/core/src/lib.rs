//! Cellflow Core
//!
//! Foundational error types, stream events, and operation schemas for the
//! Cellflow workspace. This crate has zero dependencies on application-level
//! code (database, model providers, backends).
//!
//! ## Module Organization
//!
//! - `error` - Core error taxonomy (`CoreError`, `CoreResult`)
//! - `command` - Parsed tool-call model (`ToolCommand`, `CommandKind`)
//! - `ops` - Typed operation schemas and the decode registry
//! - `streaming` - Unified stream event types
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror** - keeps build times minimal
//! 2. **Decode-time validation** - operation payloads become typed values or errors, never both
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod command;
pub mod error;
pub mod ops;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Commands ───────────────────────────────────────────────────────────
pub use command::{CommandKind, ToolCommand};

// ── Operation Schemas ──────────────────────────────────────────────────
pub use ops::{
    decode_action, decode_query, tags_for, ActionOp, CellFormat, QueryOp, ACTION_OPERATIONS,
    QUERY_OPERATIONS,
};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::StreamEvent;
