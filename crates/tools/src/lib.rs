//! Cellflow Tools
//!
//! Spreadsheet backend surface for the Cellflow workspace:
//! - `SheetBackend` trait - one method per tool-catalog operation
//! - `MemoryWorkbook` - in-process reference backend for tests and dry runs
//! - `ToolResult` - portable execution result type
//! - `cellref` - A1-style address parsing helpers
//!
//! The executor and orchestrator in the main crate are written against
//! `SheetBackend`; concrete document backends implement it elsewhere.

pub mod backend;
pub mod cellref;
pub mod memory;
pub mod result;

pub use backend::{FilterState, SheetBackend};
pub use memory::MemoryWorkbook;
pub use result::ToolResult;
