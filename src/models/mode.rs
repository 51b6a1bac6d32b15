//! Operation Mode
//!
//! System health classification derived from the rolling dispatch success
//! rate. The mode drives three adaptive levers: cache TTL (lengthened under
//! duress), the tool surface exposed to planning (trimmed under Critical),
//! and the cognitive budget granted to the next planning prompt.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cellflow_core::QUERY_OPERATIONS;

/// Success-rate floor for `Normal`.
pub const NORMAL_THRESHOLD: f64 = 0.75;
/// Success-rate floor for `Degraded`; below this is `Critical`.
pub const DEGRADED_THRESHOLD: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Normal,
    Degraded,
    Critical,
}

impl Default for OperationMode {
    fn default() -> Self {
        OperationMode::Normal
    }
}

impl OperationMode {
    /// Classify a rolling success rate in `[0, 1]`.
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= NORMAL_THRESHOLD {
            OperationMode::Normal
        } else if rate >= DEGRADED_THRESHOLD {
            OperationMode::Degraded
        } else {
            OperationMode::Critical
        }
    }

    /// Result-cache TTL for query results under this mode. Longer TTLs under
    /// duress trade staleness for fewer backend round trips.
    pub fn cache_ttl(&self) -> Duration {
        match self {
            OperationMode::Normal => Duration::from_secs(5 * 60),
            OperationMode::Degraded => Duration::from_secs(15 * 60),
            OperationMode::Critical => Duration::from_secs(30 * 60),
        }
    }

    /// Token budget for the next planning prompt (the cognitive budget).
    pub fn max_tokens(&self) -> u32 {
        match self {
            OperationMode::Normal => 4096,
            OperationMode::Degraded => 2048,
            OperationMode::Critical => 1024,
        }
    }

    /// Whether reasoning traces are requested from the model backend.
    pub fn include_reasoning(&self) -> bool {
        matches!(self, OperationMode::Normal)
    }

    /// Whether the named catalog operation stays exposed to planning.
    /// Critical trims the surface to the read-only catalog plus single-cell
    /// writes; everything is exposed otherwise.
    pub fn allows_tool(&self, name: &str) -> bool {
        match self {
            OperationMode::Normal | OperationMode::Degraded => true,
            OperationMode::Critical => {
                QUERY_OPERATIONS.contains(&name) || name == "write_cell"
            }
        }
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Normal => write!(f, "normal"),
            OperationMode::Degraded => write!(f, "degraded"),
            OperationMode::Critical => write!(f, "critical"),
        }
    }
}
