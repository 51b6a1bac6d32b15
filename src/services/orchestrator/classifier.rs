//! Quick Classifier
//!
//! Layered fast-path admission control evaluated before any model-planning
//! call. Each layer that matches short-circuits the rest:
//! 1. literal patterns for trivial read-only intents (English + Portuguese)
//! 2. destructive-keyword safety gate, pending human confirmation
//! 3. exact-text decision cache with a flat 1 h TTL
//! 4. deterministic keyword heuristics (chart, pivot, filter, sort)
//! 5. fall through to full model-driven planning
//!
//! The decision cache is keyed by exact message text, so paraphrases miss.
//! Known limitation, kept as-is.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::json;
use tracing::debug;

use cellflow_core::ToolCommand;

/// TTL of cached classification decisions.
pub const DECISION_TTL: Duration = Duration::from_secs(60 * 60);

const DESTRUCTIVE_KEYWORDS: &[&str] = &["delete", "apagar", "excluir", "remover", "drop"];

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Resolved to a deterministic tool call, no planning needed
    Direct(ToolCommand),
    /// Potentially destructive; requires human confirmation first
    NeedsConfirmation { reason: String },
    /// No fast path matched; run full planning
    Planned,
}

pub struct QuickClassifier {
    decisions: RwLock<HashMap<String, (Classification, Instant)>>,
    range_pattern: Regex,
}

impl Default for QuickClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickClassifier {
    pub fn new() -> Self {
        Self {
            decisions: RwLock::new(HashMap::new()),
            // A1-style rectangle anywhere in the message
            range_pattern: Regex::new(r"\b[A-Za-z]{1,3}\d+:[A-Za-z]{1,3}\d+\b")
                .expect("range pattern is valid"),
        }
    }

    /// Classify a user message. `sheet` is the currently active sheet, used
    /// when a heuristic needs a target.
    pub fn classify(&self, text: &str, sheet: &str) -> Classification {
        let normalized = text.trim().to_lowercase();

        // Layer 1: literal read-only intents
        if let Some(command) = literal_intent(&normalized) {
            debug!(layer = 1, "literal pattern matched");
            return Classification::Direct(command);
        }

        // Layer 2: safety gate
        if let Some(keyword) = DESTRUCTIVE_KEYWORDS
            .iter()
            .find(|k| normalized.contains(*k))
        {
            debug!(layer = 2, keyword, "destructive keyword gated");
            return Classification::NeedsConfirmation {
                reason: format!("message contains destructive keyword \"{keyword}\""),
            };
        }

        // Layer 3: decision cache (exact text)
        if let Some(cached) = self.cached_decision(&normalized) {
            debug!(layer = 3, "decision cache hit");
            return cached;
        }

        // Layer 4: keyword heuristics
        if let Some(command) = self.heuristic_intent(&normalized, sheet) {
            debug!(layer = 4, "keyword heuristic matched");
            let decision = Classification::Direct(command);
            self.remember(&normalized, decision.clone());
            return decision;
        }

        // Layer 5: full planning
        self.remember(&normalized, Classification::Planned);
        Classification::Planned
    }

    fn cached_decision(&self, normalized: &str) -> Option<Classification> {
        let decisions = self.decisions.read().unwrap_or_else(|e| e.into_inner());
        decisions.get(normalized).and_then(|(decision, stored_at)| {
            if stored_at.elapsed() < DECISION_TTL {
                Some(decision.clone())
            } else {
                None
            }
        })
    }

    fn remember(&self, normalized: &str, decision: Classification) {
        let mut decisions = self.decisions.write().unwrap_or_else(|e| e.into_inner());
        decisions.insert(normalized.to_string(), (decision, Instant::now()));
    }

    fn extract_range(&self, text: &str) -> Option<String> {
        self.range_pattern
            .find(text)
            .map(|m| m.as_str().to_uppercase())
    }

    fn heuristic_intent(&self, normalized: &str, sheet: &str) -> Option<ToolCommand> {
        if normalized.contains("chart") || normalized.contains("gráfico") {
            let range = self.extract_range(normalized)?;
            return Some(ToolCommand::action(json!({
                "operation": "create_chart",
                "sheet": sheet,
                "range": range,
                "chart_type": "column",
            })));
        }
        if normalized.contains("pivot") || normalized.contains("dinâmica") {
            let range = self.extract_range(normalized)?;
            return Some(ToolCommand::action(json!({
                "operation": "create_pivot",
                "source_sheet": sheet,
                "source_range": range,
                "target_sheet": sheet,
                "rows": [],
                "values": [],
            })));
        }
        if normalized.contains("filter") || normalized.contains("filtr") {
            return Some(ToolCommand::query(json!({
                "operation": "has_filter",
                "sheet": sheet,
            })));
        }
        if normalized.contains("sort") || normalized.contains("ordenar") {
            let range = self.extract_range(normalized)?;
            return Some(ToolCommand::action(json!({
                "operation": "sort_range",
                "sheet": sheet,
                "range": range,
                "column": 0,
            })));
        }
        None
    }
}

/// Exact patterns for trivial read-only requests.
fn literal_intent(normalized: &str) -> Option<ToolCommand> {
    let command = match normalized {
        "liste as abas" | "listar abas" | "quais abas existem" | "list sheets"
        | "list the sheets" | "what sheets are there" => {
            ToolCommand::query(json!({"operation": "list_sheets"}))
        }
        "célula ativa" | "qual a célula ativa" | "active cell" | "what is the active cell" => {
            ToolCommand::query(json!({"operation": "get_active_cell"}))
        }
        _ => return None,
    };
    Some(command)
}
