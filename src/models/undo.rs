//! Undo Models
//!
//! One `UndoAction` is recorded per applied mutating operation. The
//! `operation` payload carries everything needed to reverse the edit without
//! consulting the document again; pre-state is captured by the executor
//! before the forward call is made.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cellflow_tools::FilterState;

/// The reverse payload for one applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UndoOperation {
    /// Write the previous value back into a single cell
    RestoreCell { cell: String, old_value: Value },
    /// Rewrite a rectangle with its previous contents
    RestoreRange {
        range: String,
        old_values: Vec<Vec<Value>>,
    },
    /// Reverses create_sheet
    RemoveSheet { name: String },
    /// Reverses rename_sheet (from/to already swapped for replay)
    RenameSheet { from: String, to: String },
    /// Reverses delete_sheet from a full snapshot
    RestoreSheet { name: String, cells: Value },
    /// Reverses delete_rows: insert blank rows then rewrite captured cells
    ReinsertRows { row: u32, rows: Vec<Vec<Value>> },
    /// Reverses insert_rows
    RemoveRows { row: u32, count: u32 },
    /// Reverses merge_cells
    Unmerge { range: String },
    /// Reverses unmerge_cells
    Merge { range: String },
    RestoreColumnWidth { column: String, width: f64 },
    RestoreRowHeight { row: u32, height: f64 },
    /// Reverses sort_range by rewriting the pre-sort rectangle
    RestoreSort {
        range: String,
        old_values: Vec<Vec<Value>>,
    },
    /// Reverses apply_filter when no filter was previously active
    ClearFilter,
    /// Reverses apply_filter/clear_filter by reinstating the previous filter
    RestoreFilter { state: FilterState },
    /// Reverses set_borders (style None removes them)
    RestoreBorders {
        range: String,
        style: Option<String>,
    },
    /// Reverses format_range from an opaque backend snapshot
    RestoreFormats { snapshot: Value },
    RemoveChart { name: String },
    RemoveTable { name: String },
    RemovePivot { name: String },
    /// Irreversible best-effort operations (create_workbook, autofit)
    None,
}

impl UndoOperation {
    /// Whether replaying this entry changes the document at all.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, UndoOperation::None)
    }
}

/// A recorded, undoable edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoAction {
    /// Ledger-assigned identifier (row id for persistent ledgers)
    pub id: i64,
    pub conversation_id: String,
    /// Workbook the edit targeted
    pub document: String,
    /// Sheet the edit targeted (empty for workbook-level operations)
    pub sheet: String,
    /// Human-readable description of the edited target (cell, range, name)
    pub target: String,
    pub operation: UndoOperation,
    /// 0 for unbatched entries; otherwise groups a macro's actions
    pub batch_id: u64,
    /// Approved entries are excluded from undo
    pub approved: bool,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

impl UndoAction {
    pub fn new(
        conversation_id: impl Into<String>,
        sheet: impl Into<String>,
        target: impl Into<String>,
        operation: UndoOperation,
    ) -> Self {
        Self {
            id: 0,
            conversation_id: conversation_id.into(),
            document: String::new(),
            sheet: sheet.into(),
            target: target.into(),
            operation,
            batch_id: 0,
            approved: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.batch_id = batch_id;
        self
    }
}
