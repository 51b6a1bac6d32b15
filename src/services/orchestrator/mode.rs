//! Mode Controller
//!
//! Classifies system health from the dispatch success rate observed since
//! the previous evaluation tick. Each tick decides once: at most one mode
//! change per evaluation, so the mode cannot flap within a tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::info;

use crate::models::OperationMode;

/// Interval between health evaluations.
pub const EVALUATION_INTERVAL_SECS: u64 = 10;

pub struct ModeController {
    successes: AtomicU64,
    failures: AtomicU64,
    mode: RwLock<OperationMode>,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            mode: RwLock::new(OperationMode::Normal),
        }
    }

    /// Feed one dispatch outcome into the current window.
    pub fn record(&self, success: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn current(&self) -> OperationMode {
        *self.mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Success rate of the window so far, `None` with no samples.
    pub fn success_rate(&self) -> Option<f64> {
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            None
        } else {
            Some(successes as f64 / total as f64)
        }
    }

    /// One evaluation tick: classify the window, reset it, and return the
    /// new mode when it changed. An empty window keeps the current mode.
    pub fn evaluate(&self) -> Option<OperationMode> {
        let rate = self.success_rate();
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        let rate = rate?;

        let next = OperationMode::from_success_rate(rate);
        let mut mode = self.mode.write().unwrap_or_else(|e| e.into_inner());
        if next != *mode {
            info!(from = %mode, to = %next, rate, "operation mode changed");
            *mode = next;
            Some(next)
        } else {
            None
        }
    }
}
