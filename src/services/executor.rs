//! Tool Executor
//!
//! Decodes command payloads through the typed operation registry and runs
//! them against the document backend. Queries return a human-readable line
//! and leave no trace; actions capture pre-state into the undo ledger before
//! they apply. A macro runs its nested actions as one undo batch, stopping
//! at the first failure but always closing the batch.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use cellflow_core::{decode_action, decode_query, ActionOp, CoreError, QueryOp, ToolCommand};
use cellflow_tools::cellref::{parse_range, range_name};
use cellflow_tools::{FilterState, SheetBackend};

use crate::models::{UndoAction, UndoOperation};
use crate::services::undo::UndoLedger;
use crate::utils::error::AppResult;

pub struct ToolExecutor {
    backend: Arc<dyn SheetBackend>,
    ledger: Arc<dyn UndoLedger>,
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_rows(rows: &[Vec<Value>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(render_value)
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

impl ToolExecutor {
    pub fn new(backend: Arc<dyn SheetBackend>, ledger: Arc<dyn UndoLedger>) -> Self {
        Self { backend, ledger }
    }

    pub fn backend(&self) -> &Arc<dyn SheetBackend> {
        &self.backend
    }

    pub fn ledger(&self) -> &Arc<dyn UndoLedger> {
        &self.ledger
    }

    /// Execute one parsed command. Unknown operations and malformed payloads
    /// surface as typed errors from the decode step.
    pub async fn execute(&self, conversation_id: &str, command: &ToolCommand) -> AppResult<String> {
        if command.is_mutating() {
            let op = decode_action(command.payload.clone())?;
            debug!(operation = op.name(), "executing action");
            if let ActionOp::Macro { actions } = op {
                self.run_macro(conversation_id, actions).await
            } else {
                self.apply_action(conversation_id, op).await
            }
        } else {
            let op = decode_query(command.payload.clone())?;
            debug!(operation = op.name(), "executing query");
            self.run_query(op).await
        }
    }

    async fn run_query(&self, op: QueryOp) -> AppResult<String> {
        let backend = &self.backend;
        let line = match op {
            QueryOp::ListSheets => render_list(&backend.list_sheets().await?),
            QueryOp::SheetExists { sheet } => backend.sheet_exists(&sheet).await?.to_string(),
            QueryOp::GetUsedRange { sheet } => backend.used_range(&sheet).await?,
            QueryOp::GetHeaders { sheet } => backend.headers(&sheet).await?.join(" | "),
            QueryOp::GetCellFormula { sheet, cell } => {
                let formula = backend.cell_formula(&sheet, &cell).await?;
                if formula.is_empty() {
                    "(no formula)".to_string()
                } else {
                    formula
                }
            }
            QueryOp::GetActiveCell => {
                let (sheet, cell) = backend.active_cell().await?;
                format!("{sheet}!{cell}")
            }
            QueryOp::ListTables { sheet } => render_list(&backend.list_tables(&sheet).await?),
            QueryOp::ListCharts { sheet } => render_list(&backend.list_charts(&sheet).await?),
            QueryOp::ListPivots { sheet } => render_list(&backend.list_pivots(&sheet).await?),
            QueryOp::GetRangeValues { sheet, range } => {
                render_rows(&backend.range_values(&sheet, &range).await?)
            }
            QueryOp::HasFilter { sheet } => backend.has_filter(&sheet).await?.to_string(),
            QueryOp::GetRowCount { sheet } => backend.row_count(&sheet).await?.to_string(),
            QueryOp::GetColumnCount { sheet } => backend.column_count(&sheet).await?.to_string(),
        };
        Ok(line)
    }

    /// Nested macro actions share one batch id. The first failure aborts the
    /// remaining actions; the batch is closed regardless so the applied
    /// prefix undoes as a unit.
    async fn run_macro(&self, conversation_id: &str, actions: Vec<Value>) -> AppResult<String> {
        let batch = self.ledger.start_batch().await;
        debug!(batch, count = actions.len(), "macro batch opened");
        let mut lines = Vec::new();
        for payload in actions {
            let outcome = match decode_action(payload) {
                Ok(ActionOp::Macro { .. }) => Err("macros do not nest".to_string()),
                Ok(op) => self
                    .apply_action(conversation_id, op)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(line) => lines.push(line),
                Err(e) => {
                    lines.push(format!("ERROR: {e}"));
                    break;
                }
            }
        }
        self.ledger.end_batch().await;
        Ok(lines.join("\n"))
    }

    /// Capture pre-state, record the reverse entry, then apply.
    async fn apply_action(&self, conversation_id: &str, op: ActionOp) -> AppResult<String> {
        let backend = &self.backend;
        let record = |sheet: &str, target: &str, operation: UndoOperation| {
            UndoAction::new(conversation_id, sheet, target, operation)
        };

        let line = match op {
            ActionOp::WriteCell { sheet, cell, value } => {
                let old_value = backend.cell_value(&sheet, &cell).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &cell,
                        UndoOperation::RestoreCell {
                            cell: cell.clone(),
                            old_value,
                        },
                    ))
                    .await?;
                backend.write_cell(&sheet, &cell, value).await?;
                format!("✓ Wrote {cell} on {sheet}")
            }
            ActionOp::WriteRange {
                sheet,
                range,
                values,
            } => {
                // The written rectangle is anchored at the range's top-left
                // and sized by the value matrix, not the declared corners.
                let ((r1, c1), _) = parse_range(&range)?;
                let height = values.len() as u32;
                let width = values.iter().map(Vec::len).max().unwrap_or(0) as u32;
                let target = if height > 0 && width > 0 {
                    range_name((r1, c1), (r1 + height - 1, c1 + width - 1))
                } else {
                    range.clone()
                };
                let old_values = backend.range_values(&sheet, &target).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &target,
                        UndoOperation::RestoreRange {
                            range: target.clone(),
                            old_values,
                        },
                    ))
                    .await?;
                backend.write_range(&sheet, &range, values).await?;
                format!("✓ Wrote {target} on {sheet}")
            }
            ActionOp::CreateSheet { name } => {
                self.ledger
                    .record(record(
                        "",
                        &name,
                        UndoOperation::RemoveSheet { name: name.clone() },
                    ))
                    .await?;
                backend.create_sheet(&name).await?;
                format!("✓ Sheet {name} created")
            }
            ActionOp::RenameSheet { from, to } => {
                // Swapped so the inverse replays directly
                self.ledger
                    .record(record(
                        "",
                        &to,
                        UndoOperation::RenameSheet {
                            from: to.clone(),
                            to: from.clone(),
                        },
                    ))
                    .await?;
                backend.rename_sheet(&from, &to).await?;
                format!("✓ Sheet {from} renamed to {to}")
            }
            ActionOp::DeleteSheet { name } => {
                let cells = backend.sheet_snapshot(&name).await?;
                self.ledger
                    .record(record(
                        "",
                        &name,
                        UndoOperation::RestoreSheet {
                            name: name.clone(),
                            cells,
                        },
                    ))
                    .await?;
                backend.delete_sheet(&name).await?;
                format!("✓ Sheet {name} deleted")
            }
            ActionOp::CreateWorkbook { name } => {
                self.ledger
                    .record(record("", &name, UndoOperation::None))
                    .await?;
                backend.create_workbook(&name).await?;
                format!("✓ Workbook {name} created")
            }
            ActionOp::FormatRange {
                sheet,
                range,
                format,
            } => {
                let snapshot = backend.range_formats(&sheet, &range).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::RestoreFormats { snapshot },
                    ))
                    .await?;
                backend.format_range(&sheet, &range, &format).await?;
                format!("✓ Formatted {range} on {sheet}")
            }
            ActionOp::ClearRange { sheet, range } => {
                let old_values = backend.range_values(&sheet, &range).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::RestoreRange {
                            range: range.clone(),
                            old_values,
                        },
                    ))
                    .await?;
                backend.clear_range(&sheet, &range).await?;
                format!("✓ Cleared {range} on {sheet}")
            }
            ActionOp::Autofit { sheet } => {
                self.ledger
                    .record(record(&sheet, "", UndoOperation::None))
                    .await?;
                backend.autofit(&sheet).await?;
                format!("✓ Autofit {sheet}")
            }
            ActionOp::InsertRows { sheet, row, count } => {
                self.ledger
                    .record(record(
                        &sheet,
                        &format!("rows {row}+{count}"),
                        UndoOperation::RemoveRows { row, count },
                    ))
                    .await?;
                backend.insert_rows(&sheet, row, count).await?;
                format!("✓ Inserted {count} row(s) at {row} on {sheet}")
            }
            ActionOp::DeleteRows { sheet, row, count } => {
                let rows = backend.row_values(&sheet, row, count).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &format!("rows {row}+{count}"),
                        UndoOperation::ReinsertRows { row, rows },
                    ))
                    .await?;
                backend.delete_rows(&sheet, row, count).await?;
                format!("✓ Deleted {count} row(s) at {row} on {sheet}")
            }
            ActionOp::MergeCells { sheet, range } => {
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::Unmerge {
                            range: range.clone(),
                        },
                    ))
                    .await?;
                backend.merge_cells(&sheet, &range).await?;
                format!("✓ Merged {range} on {sheet}")
            }
            ActionOp::UnmergeCells { sheet, range } => {
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::Merge {
                            range: range.clone(),
                        },
                    ))
                    .await?;
                backend.unmerge_cells(&sheet, &range).await?;
                format!("✓ Unmerged {range} on {sheet}")
            }
            ActionOp::SetBorders {
                sheet,
                range,
                style,
            } => {
                let old_style = backend.border_style(&sheet, &range).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::RestoreBorders {
                            range: range.clone(),
                            style: old_style,
                        },
                    ))
                    .await?;
                backend.set_borders(&sheet, &range, Some(&style)).await?;
                format!("✓ Borders set on {range} ({sheet})")
            }
            ActionOp::SetColumnWidth {
                sheet,
                column,
                width,
            } => {
                let old_width = backend.column_width(&sheet, &column).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &column,
                        UndoOperation::RestoreColumnWidth {
                            column: column.clone(),
                            width: old_width,
                        },
                    ))
                    .await?;
                backend.set_column_width(&sheet, &column, width).await?;
                format!("✓ Column {column} width set on {sheet}")
            }
            ActionOp::SetRowHeight { sheet, row, height } => {
                let old_height = backend.row_height(&sheet, row).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &row.to_string(),
                        UndoOperation::RestoreRowHeight {
                            row,
                            height: old_height,
                        },
                    ))
                    .await?;
                backend.set_row_height(&sheet, row, height).await?;
                format!("✓ Row {row} height set on {sheet}")
            }
            ActionOp::ApplyFilter {
                sheet,
                range,
                column,
                criteria,
            } => {
                let previous = backend.filter_state(&sheet).await?;
                let operation = match previous {
                    Some(state) => UndoOperation::RestoreFilter { state },
                    None => UndoOperation::ClearFilter,
                };
                self.ledger.record(record(&sheet, &range, operation)).await?;
                backend
                    .apply_filter(
                        &sheet,
                        FilterState {
                            range: range.clone(),
                            column,
                            criteria,
                        },
                    )
                    .await?;
                format!("✓ Filter applied to {range} on {sheet}")
            }
            ActionOp::ClearFilter { sheet } => {
                let previous = backend.filter_state(&sheet).await?;
                let operation = match previous {
                    Some(state) => UndoOperation::RestoreFilter { state },
                    None => UndoOperation::None,
                };
                self.ledger.record(record(&sheet, "", operation)).await?;
                backend.clear_filter(&sheet).await?;
                format!("✓ Filter cleared on {sheet}")
            }
            ActionOp::SortRange {
                sheet,
                range,
                column,
                ascending,
            } => {
                let old_values = backend.range_values(&sheet, &range).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &range,
                        UndoOperation::RestoreSort {
                            range: range.clone(),
                            old_values,
                        },
                    ))
                    .await?;
                backend.sort_range(&sheet, &range, column, ascending).await?;
                format!("✓ Sorted {range} on {sheet}")
            }
            ActionOp::CopyRange { sheet, from, to } => {
                let ((r1, c1), (r2, c2)) = parse_range(&from)?;
                let ((tr, tc), _) = parse_range(&to)?;
                let dest = range_name((tr, tc), (tr + (r2 - r1), tc + (c2 - c1)));
                let old_values = backend.range_values(&sheet, &dest).await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &dest,
                        UndoOperation::RestoreRange {
                            range: dest.clone(),
                            old_values,
                        },
                    ))
                    .await?;
                backend.copy_range(&sheet, &from, &to).await?;
                format!("✓ Copied {from} to {to} on {sheet}")
            }
            ActionOp::CreateChart {
                sheet,
                range,
                chart_type,
                title,
            } => {
                // Name is assigned by the backend, so the entry follows the apply.
                let name = backend
                    .create_chart(&sheet, &range, &chart_type, &title)
                    .await?;
                self.ledger
                    .record(record(
                        &sheet,
                        &name,
                        UndoOperation::RemoveChart { name: name.clone() },
                    ))
                    .await?;
                format!("✓ Chart {name} created on {sheet}")
            }
            ActionOp::DeleteChart { sheet, name } => {
                self.ledger
                    .record(record(&sheet, &name, UndoOperation::None))
                    .await?;
                backend.delete_chart(&sheet, &name).await?;
                format!("✓ Chart {name} deleted from {sheet}")
            }
            ActionOp::CreateTable { sheet, range, name } => {
                self.ledger
                    .record(record(
                        &sheet,
                        &name,
                        UndoOperation::RemoveTable { name: name.clone() },
                    ))
                    .await?;
                backend.create_table(&sheet, &range, &name).await?;
                format!("✓ Table {name} created on {sheet}")
            }
            ActionOp::DeleteTable { sheet, name } => {
                self.ledger
                    .record(record(&sheet, &name, UndoOperation::None))
                    .await?;
                backend.delete_table(&sheet, &name).await?;
                format!("✓ Table {name} deleted from {sheet}")
            }
            ActionOp::CreatePivot {
                source_sheet,
                source_range,
                target_sheet,
                rows,
                values,
            } => {
                let name = backend
                    .create_pivot(&source_sheet, &source_range, &target_sheet, &rows, &values)
                    .await?;
                self.ledger
                    .record(record(
                        &target_sheet,
                        &name,
                        UndoOperation::RemovePivot { name: name.clone() },
                    ))
                    .await?;
                format!("✓ Pivot {name} created on {target_sheet}")
            }
            ActionOp::Macro { .. } => {
                // Dispatched in execute(); rejected by run_macro when nested.
                return Err(CoreError::invalid_payload("macros do not nest").into());
            }
        };
        Ok(line)
    }
}
