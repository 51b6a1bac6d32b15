//! Typed Operation Schemas
//!
//! Every catalog operation has a typed argument schema, validated at decode
//! time through one operation-name-keyed registry instead of ad hoc type
//! assertions inside the executor. Unknown operation names fail with
//! `UnknownOperation`; well-known operations with malformed arguments fail
//! with `InvalidPayload`.
//!
//! Model output decodes JSON numbers as floating point, so integer-valued
//! fields (row indices, counts, column indices) tolerate values like `3.0`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

// ============================================================================
// Lenient numeric decoding
// ============================================================================

fn de_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.fract() != 0.0 || raw < 0.0 || raw > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {raw}"
        )));
    }
    Ok(raw as u32)
}

fn default_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Cell formatting
// ============================================================================

/// Formatting attributes applied by `format_range`. All fields optional;
/// absent fields leave the existing format untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub fill_color: Option<String>,
    pub number_format: Option<String>,
}

// ============================================================================
// Query operations
// ============================================================================

/// Read-only catalog operations. Never produce undo entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum QueryOp {
    ListSheets,
    SheetExists { sheet: String },
    GetUsedRange { sheet: String },
    GetHeaders { sheet: String },
    GetCellFormula { sheet: String, cell: String },
    GetActiveCell,
    ListTables { sheet: String },
    ListCharts { sheet: String },
    ListPivots { sheet: String },
    GetRangeValues { sheet: String, range: String },
    HasFilter { sheet: String },
    GetRowCount { sheet: String },
    GetColumnCount { sheet: String },
}

impl QueryOp {
    /// Operation name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            QueryOp::ListSheets => "list_sheets",
            QueryOp::SheetExists { .. } => "sheet_exists",
            QueryOp::GetUsedRange { .. } => "get_used_range",
            QueryOp::GetHeaders { .. } => "get_headers",
            QueryOp::GetCellFormula { .. } => "get_cell_formula",
            QueryOp::GetActiveCell => "get_active_cell",
            QueryOp::ListTables { .. } => "list_tables",
            QueryOp::ListCharts { .. } => "list_charts",
            QueryOp::ListPivots { .. } => "list_pivots",
            QueryOp::GetRangeValues { .. } => "get_range_values",
            QueryOp::HasFilter { .. } => "has_filter",
            QueryOp::GetRowCount { .. } => "get_row_count",
            QueryOp::GetColumnCount { .. } => "get_column_count",
        }
    }
}

// ============================================================================
// Action operations
// ============================================================================

/// Mutating catalog operations. The executor captures the pre-state needed
/// to reverse each one before applying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ActionOp {
    WriteCell {
        sheet: String,
        cell: String,
        value: Value,
    },
    WriteRange {
        sheet: String,
        range: String,
        values: Vec<Vec<Value>>,
    },
    CreateSheet {
        name: String,
    },
    RenameSheet {
        from: String,
        to: String,
    },
    DeleteSheet {
        name: String,
    },
    CreateWorkbook {
        name: String,
    },
    FormatRange {
        sheet: String,
        range: String,
        #[serde(default)]
        format: CellFormat,
    },
    ClearRange {
        sheet: String,
        range: String,
    },
    Autofit {
        sheet: String,
    },
    InsertRows {
        sheet: String,
        #[serde(deserialize_with = "de_u32")]
        row: u32,
        #[serde(default = "default_count", deserialize_with = "de_u32")]
        count: u32,
    },
    DeleteRows {
        sheet: String,
        #[serde(deserialize_with = "de_u32")]
        row: u32,
        #[serde(default = "default_count", deserialize_with = "de_u32")]
        count: u32,
    },
    MergeCells {
        sheet: String,
        range: String,
    },
    UnmergeCells {
        sheet: String,
        range: String,
    },
    SetBorders {
        sheet: String,
        range: String,
        style: String,
    },
    SetColumnWidth {
        sheet: String,
        column: String,
        width: f64,
    },
    SetRowHeight {
        sheet: String,
        #[serde(deserialize_with = "de_u32")]
        row: u32,
        height: f64,
    },
    ApplyFilter {
        sheet: String,
        range: String,
        #[serde(deserialize_with = "de_u32")]
        column: u32,
        criteria: String,
    },
    ClearFilter {
        sheet: String,
    },
    SortRange {
        sheet: String,
        range: String,
        #[serde(deserialize_with = "de_u32")]
        column: u32,
        #[serde(default = "default_true")]
        ascending: bool,
    },
    CopyRange {
        sheet: String,
        from: String,
        to: String,
    },
    CreateChart {
        sheet: String,
        range: String,
        chart_type: String,
        #[serde(default)]
        title: String,
    },
    DeleteChart {
        sheet: String,
        name: String,
    },
    CreateTable {
        sheet: String,
        range: String,
        name: String,
    },
    DeleteTable {
        sheet: String,
        name: String,
    },
    CreatePivot {
        source_sheet: String,
        source_range: String,
        target_sheet: String,
        rows: Vec<String>,
        values: Vec<String>,
    },
    /// An ordered list of nested actions executed as one undo batch.
    /// Macros do not nest.
    Macro {
        actions: Vec<Value>,
    },
}

impl ActionOp {
    /// Operation name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ActionOp::WriteCell { .. } => "write_cell",
            ActionOp::WriteRange { .. } => "write_range",
            ActionOp::CreateSheet { .. } => "create_sheet",
            ActionOp::RenameSheet { .. } => "rename_sheet",
            ActionOp::DeleteSheet { .. } => "delete_sheet",
            ActionOp::CreateWorkbook { .. } => "create_workbook",
            ActionOp::FormatRange { .. } => "format_range",
            ActionOp::ClearRange { .. } => "clear_range",
            ActionOp::Autofit { .. } => "autofit",
            ActionOp::InsertRows { .. } => "insert_rows",
            ActionOp::DeleteRows { .. } => "delete_rows",
            ActionOp::MergeCells { .. } => "merge_cells",
            ActionOp::UnmergeCells { .. } => "unmerge_cells",
            ActionOp::SetBorders { .. } => "set_borders",
            ActionOp::SetColumnWidth { .. } => "set_column_width",
            ActionOp::SetRowHeight { .. } => "set_row_height",
            ActionOp::ApplyFilter { .. } => "apply_filter",
            ActionOp::ClearFilter { .. } => "clear_filter",
            ActionOp::SortRange { .. } => "sort_range",
            ActionOp::CopyRange { .. } => "copy_range",
            ActionOp::CreateChart { .. } => "create_chart",
            ActionOp::DeleteChart { .. } => "delete_chart",
            ActionOp::CreateTable { .. } => "create_table",
            ActionOp::DeleteTable { .. } => "delete_table",
            ActionOp::CreatePivot { .. } => "create_pivot",
            ActionOp::Macro { .. } => "macro",
        }
    }

    /// Resource tags this action touches, used for bulk cache invalidation.
    /// Any cached query whose tags intersect these is evicted.
    pub fn touched_tags(&self) -> Vec<String> {
        let sheet_tag = |s: &str| format!("sheet:{s}");
        match self {
            ActionOp::WriteCell { sheet, .. }
            | ActionOp::WriteRange { sheet, .. }
            | ActionOp::FormatRange { sheet, .. }
            | ActionOp::ClearRange { sheet, .. }
            | ActionOp::Autofit { sheet }
            | ActionOp::InsertRows { sheet, .. }
            | ActionOp::DeleteRows { sheet, .. }
            | ActionOp::MergeCells { sheet, .. }
            | ActionOp::UnmergeCells { sheet, .. }
            | ActionOp::SetBorders { sheet, .. }
            | ActionOp::SetColumnWidth { sheet, .. }
            | ActionOp::SetRowHeight { sheet, .. }
            | ActionOp::ApplyFilter { sheet, .. }
            | ActionOp::ClearFilter { sheet }
            | ActionOp::SortRange { sheet, .. }
            | ActionOp::CopyRange { sheet, .. }
            | ActionOp::DeleteChart { sheet, .. }
            | ActionOp::DeleteTable { sheet, .. } => vec![sheet_tag(sheet)],
            ActionOp::CreateChart { sheet, .. } | ActionOp::CreateTable { sheet, .. } => {
                vec![sheet_tag(sheet)]
            }
            ActionOp::CreateSheet { name } | ActionOp::DeleteSheet { name } => {
                // Sheet creation/removal also changes the workbook shape.
                vec![sheet_tag(name), "workbook:*".to_string()]
            }
            ActionOp::RenameSheet { from, to } => {
                vec![sheet_tag(from), sheet_tag(to), "workbook:*".to_string()]
            }
            ActionOp::CreateWorkbook { name } => vec![format!("workbook:{name}")],
            ActionOp::CreatePivot {
                source_sheet,
                target_sheet,
                ..
            } => vec![sheet_tag(source_sheet), sheet_tag(target_sheet)],
            ActionOp::Macro { actions } => {
                let mut tags: Vec<String> = actions
                    .iter()
                    .filter_map(|a| decode_action(a.clone()).ok())
                    .flat_map(|op| op.touched_tags())
                    .collect();
                tags.sort();
                tags.dedup();
                tags
            }
        }
    }
}

// ============================================================================
// Catalog & decode registry
// ============================================================================

/// All read-only operation names, in catalog order.
pub const QUERY_OPERATIONS: &[&str] = &[
    "list_sheets",
    "sheet_exists",
    "get_used_range",
    "get_headers",
    "get_cell_formula",
    "get_active_cell",
    "list_tables",
    "list_charts",
    "list_pivots",
    "get_range_values",
    "has_filter",
    "get_row_count",
    "get_column_count",
];

/// All mutating operation names, in catalog order.
pub const ACTION_OPERATIONS: &[&str] = &[
    "write_cell",
    "write_range",
    "create_sheet",
    "rename_sheet",
    "delete_sheet",
    "create_workbook",
    "format_range",
    "clear_range",
    "autofit",
    "insert_rows",
    "delete_rows",
    "merge_cells",
    "unmerge_cells",
    "set_borders",
    "set_column_width",
    "set_row_height",
    "apply_filter",
    "clear_filter",
    "sort_range",
    "copy_range",
    "create_chart",
    "delete_chart",
    "create_table",
    "delete_table",
    "create_pivot",
    "macro",
];

fn operation_name(payload: &Value) -> CoreResult<&str> {
    payload
        .get("operation")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::invalid_payload("missing `operation` field"))
}

/// Decode a query payload into its typed schema.
pub fn decode_query(payload: Value) -> CoreResult<QueryOp> {
    let name = operation_name(&payload)?;
    if !QUERY_OPERATIONS.contains(&name) {
        return Err(CoreError::unknown_operation(name));
    }
    serde_json::from_value(payload).map_err(|e| CoreError::invalid_payload(e.to_string()))
}

/// Decode an action payload into its typed schema.
pub fn decode_action(payload: Value) -> CoreResult<ActionOp> {
    let name = operation_name(&payload)?;
    if !ACTION_OPERATIONS.contains(&name) {
        return Err(CoreError::unknown_operation(name));
    }
    serde_json::from_value(payload).map_err(|e| CoreError::invalid_payload(e.to_string()))
}

/// Cache tags for an arbitrary tool payload: the tool name plus any
/// `sheet`/`workbook`/`range` arguments present.
pub fn tags_for(tool_name: &str, args: &Value) -> Vec<String> {
    let mut tags = vec![format!("tool:{tool_name}")];
    // Workbook-shape queries go stale on sheet create/delete/rename
    if matches!(tool_name, "list_sheets" | "sheet_exists") {
        tags.push("workbook:*".to_string());
    }
    for key in ["sheet", "workbook", "range"] {
        if let Some(v) = args.get(key).and_then(Value::as_str) {
            tags.push(format!("{key}:{v}"));
        }
    }
    tags
}
