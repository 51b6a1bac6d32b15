//! Spreadsheet Backend Trait
//!
//! One method per catalog operation. The control core is written against
//! this trait; concrete backends (native automation, file-format libraries)
//! implement it elsewhere. `MemoryWorkbook` in this crate is the in-process
//! reference implementation used by tests and dry runs.
//!
//! The backend is a shared resource that is not inherently thread-safe for
//! structural mutations: concurrent edits to disjoint cells are fine, but
//! callers must serialize concurrent structural changes (row inserts, sheet
//! deletes) themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cellflow_core::{CellFormat, CoreResult};

/// Active auto-filter state on a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub range: String,
    /// Zero-based column offset within the filtered range
    pub column: u32,
    pub criteria: String,
}

/// Document backend capability surface, one method per tool-catalog
/// operation plus the pre-state reads the undo ledger needs.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    // ── Queries ────────────────────────────────────────────────────────

    async fn list_sheets(&self) -> CoreResult<Vec<String>>;
    async fn sheet_exists(&self, sheet: &str) -> CoreResult<bool>;
    /// A1-style address of the rectangle containing all populated cells.
    async fn used_range(&self, sheet: &str) -> CoreResult<String>;
    /// First-row values of the used range, rendered as strings.
    async fn headers(&self, sheet: &str) -> CoreResult<Vec<String>>;
    /// The formula stored in a cell, or empty string for plain values.
    async fn cell_formula(&self, sheet: &str, cell: &str) -> CoreResult<String>;
    /// `(sheet, cell)` of the current selection.
    async fn active_cell(&self) -> CoreResult<(String, String)>;
    async fn list_tables(&self, sheet: &str) -> CoreResult<Vec<String>>;
    async fn list_charts(&self, sheet: &str) -> CoreResult<Vec<String>>;
    async fn list_pivots(&self, sheet: &str) -> CoreResult<Vec<String>>;
    async fn range_values(&self, sheet: &str, range: &str) -> CoreResult<Vec<Vec<Value>>>;
    async fn has_filter(&self, sheet: &str) -> CoreResult<bool>;
    async fn row_count(&self, sheet: &str) -> CoreResult<u32>;
    async fn column_count(&self, sheet: &str) -> CoreResult<u32>;

    // ── Pre-state reads for undo capture ───────────────────────────────

    async fn cell_value(&self, sheet: &str, cell: &str) -> CoreResult<Value>;
    /// Values of `count` whole rows starting at 1-based `row`, spanning the
    /// used-range width.
    async fn row_values(&self, sheet: &str, row: u32, count: u32) -> CoreResult<Vec<Vec<Value>>>;
    async fn column_width(&self, sheet: &str, column: &str) -> CoreResult<f64>;
    async fn row_height(&self, sheet: &str, row: u32) -> CoreResult<f64>;
    async fn filter_state(&self, sheet: &str) -> CoreResult<Option<FilterState>>;
    async fn border_style(&self, sheet: &str, range: &str) -> CoreResult<Option<String>>;
    /// Snapshot of formats over a range, opaque to callers; fed back into
    /// `restore_formats` on undo.
    async fn range_formats(&self, sheet: &str, range: &str) -> CoreResult<Value>;
    /// Full cell contents of a sheet, used before `delete_sheet`.
    async fn sheet_snapshot(&self, sheet: &str) -> CoreResult<Value>;

    // ── Actions ────────────────────────────────────────────────────────

    async fn write_cell(&self, sheet: &str, cell: &str, value: Value) -> CoreResult<()>;
    async fn write_range(
        &self,
        sheet: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> CoreResult<()>;
    async fn create_sheet(&self, name: &str) -> CoreResult<()>;
    async fn rename_sheet(&self, from: &str, to: &str) -> CoreResult<()>;
    async fn delete_sheet(&self, name: &str) -> CoreResult<()>;
    /// Restore a previously deleted sheet from a `sheet_snapshot`.
    async fn restore_sheet(&self, name: &str, snapshot: Value) -> CoreResult<()>;
    async fn create_workbook(&self, name: &str) -> CoreResult<()>;
    async fn format_range(&self, sheet: &str, range: &str, format: &CellFormat) -> CoreResult<()>;
    /// Reapply a `range_formats` snapshot on undo.
    async fn restore_formats(&self, sheet: &str, snapshot: Value) -> CoreResult<()>;
    async fn clear_range(&self, sheet: &str, range: &str) -> CoreResult<()>;
    async fn autofit(&self, sheet: &str) -> CoreResult<()>;
    async fn insert_rows(&self, sheet: &str, row: u32, count: u32) -> CoreResult<()>;
    async fn delete_rows(&self, sheet: &str, row: u32, count: u32) -> CoreResult<()>;
    async fn merge_cells(&self, sheet: &str, range: &str) -> CoreResult<()>;
    async fn unmerge_cells(&self, sheet: &str, range: &str) -> CoreResult<()>;
    async fn set_borders(&self, sheet: &str, range: &str, style: Option<&str>) -> CoreResult<()>;
    async fn set_column_width(&self, sheet: &str, column: &str, width: f64) -> CoreResult<()>;
    async fn set_row_height(&self, sheet: &str, row: u32, height: f64) -> CoreResult<()>;
    async fn apply_filter(&self, sheet: &str, state: FilterState) -> CoreResult<()>;
    async fn clear_filter(&self, sheet: &str) -> CoreResult<()>;
    async fn sort_range(
        &self,
        sheet: &str,
        range: &str,
        column: u32,
        ascending: bool,
    ) -> CoreResult<()>;
    async fn copy_range(&self, sheet: &str, from: &str, to: &str) -> CoreResult<()>;
    /// Returns the created chart's name.
    async fn create_chart(
        &self,
        sheet: &str,
        range: &str,
        chart_type: &str,
        title: &str,
    ) -> CoreResult<String>;
    async fn delete_chart(&self, sheet: &str, name: &str) -> CoreResult<()>;
    async fn create_table(&self, sheet: &str, range: &str, name: &str) -> CoreResult<()>;
    async fn delete_table(&self, sheet: &str, name: &str) -> CoreResult<()>;
    /// Returns the created pivot's name.
    async fn create_pivot(
        &self,
        source_sheet: &str,
        source_range: &str,
        target_sheet: &str,
        rows: &[String],
        values: &[String],
    ) -> CoreResult<String>;
    async fn delete_pivot(&self, sheet: &str, name: &str) -> CoreResult<()>;
}
