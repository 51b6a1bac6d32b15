//! Parallel Orchestrator
//!
//! Optional parallel execution layer: worker pool with priority dispatch,
//! tagged result cache, failure memoization, the adaptive mode controller,
//! and the quick classifier that keeps trivial requests away from planning.

pub mod cache;
pub mod classifier;
pub mod failure;
pub mod mode;
pub mod service;
pub mod worker_pool;

pub use cache::{cache_key, CacheEntry, ResultCache};
pub use classifier::{Classification, QuickClassifier};
pub use failure::{FailureMemo, RECURRENT_THRESHOLD};
pub use mode::ModeController;
pub use service::Orchestrator;
pub use worker_pool::{TaskRunner, WorkerPool};
