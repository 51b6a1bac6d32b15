//! Failure Memoization
//!
//! Per-task-key failure counters. Three consecutive failures flag the key
//! recurrent so callers short-circuit instead of burning further model
//! turns on a broken operation; any success wipes the record.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use tracing::warn;

/// Consecutive failures before a key is considered recurrent.
pub const RECURRENT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub count: u32,
    pub last_error: String,
    pub last_at: Instant,
}

#[derive(Default)]
pub struct FailureMemo {
    records: RwLock<HashMap<String, FailureRecord>>,
}

impl FailureMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the consecutive-failure count after recording.
    pub fn record_failure(&self, key: &str, error: impl Into<String>) -> u32 {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records.entry(key.to_string()).or_insert(FailureRecord {
            count: 0,
            last_error: String::new(),
            last_at: Instant::now(),
        });
        record.count += 1;
        record.last_error = error.into();
        record.last_at = Instant::now();
        if record.count == RECURRENT_THRESHOLD {
            warn!(key, error = %record.last_error, "task key flagged recurrent");
        }
        record.count
    }

    /// A success resets the streak entirely.
    pub fn record_success(&self, key: &str) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.remove(key);
    }

    pub fn is_recurrent(&self, key: &str) -> bool {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .get(key)
            .map(|r| r.count >= RECURRENT_THRESHOLD)
            .unwrap_or(false)
    }

    /// Last recorded error for a key, if any.
    pub fn last_error(&self, key: &str) -> Option<String> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(key).map(|r| r.last_error.clone())
    }
}
