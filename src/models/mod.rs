//! Data Models
//!
//! Contains the data structures shared across services and storage.

pub mod mode;
pub mod task;
pub mod undo;

pub use mode::*;
pub use task::*;
pub use undo::*;
