//! Undo Ledger
//!
//! Records one reversible entry per applied mutating operation and replays
//! inverses newest-first. Batched entries (macros) are undone or approved as
//! a unit, never partially. One trait covers in-memory and persistent
//! ledgers; the storage difference lives entirely in `ConversationStore`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, warn};

use cellflow_core::CoreResult;
use cellflow_tools::cellref::range_name;
use cellflow_tools::SheetBackend;

use crate::models::{UndoAction, UndoOperation};
use crate::storage::{ConversationStore, MemoryStore};
use crate::utils::error::AppResult;

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoOutcome {
    /// Entries successfully reversed (and removed from the ledger)
    pub undone: usize,
    /// Set when an inverse failed; remaining entries stay in the ledger
    pub error: Option<String>,
}

impl UndoOutcome {
    fn empty() -> Self {
        Self {
            undone: 0,
            error: None,
        }
    }
}

/// Ledger surface shared by the executor and the agent loop.
#[async_trait]
pub trait UndoLedger: Send + Sync {
    /// Open a batch; returns its id. Ids are nanosecond-derived and strictly
    /// increasing across calls.
    async fn start_batch(&self) -> u64;
    /// Close the open batch; subsequent entries are unbatched again.
    async fn end_batch(&self);
    /// Record an entry, tagging it with the open batch id (or 0).
    async fn record(&self, action: UndoAction) -> AppResult<()>;
    /// Reverse the newest entry; a non-zero batch id cascades through the
    /// whole batch. An inverse failure stops the cascade immediately.
    async fn undo_last(
        &self,
        conversation_id: &str,
        backend: &dyn SheetBackend,
    ) -> AppResult<UndoOutcome>;
    /// Reverse the most recent batch group for a conversation.
    async fn undo_conversation(
        &self,
        conversation_id: &str,
        backend: &dyn SheetBackend,
    ) -> AppResult<UndoOutcome>;
    /// Mark a batch approved; approved entries never replay.
    async fn approve_batch(&self, conversation_id: &str, batch_id: u64) -> AppResult<usize>;
    /// Id of the most recently closed batch, 0 if none.
    async fn last_batch_id(&self) -> u64;
    async fn pending_count(&self, conversation_id: &str) -> AppResult<usize>;
}

/// Ledger over any `ConversationStore`. `StoreLedger::in_memory()` is the
/// memory-backed variant used by tests.
pub struct StoreLedger {
    store: Arc<dyn ConversationStore>,
    open_batch: Mutex<Option<u64>>,
    last_batch: AtomicU64,
    last_issued: AtomicU64,
}

impl StoreLedger {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            open_batch: Mutex::new(None),
            last_batch: AtomicU64::new(0),
            last_issued: AtomicU64::new(0),
        }
    }

    /// Ledger over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Nanosecond-derived id, bumped past the previous one when the clock
    /// stalls or steps backwards.
    fn next_batch_id(&self) -> u64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut prev = self.last_issued.load(Ordering::SeqCst);
        loop {
            let candidate = nanos.max(prev + 1);
            match self.last_issued.compare_exchange(
                prev,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    async fn undo_entries(
        &self,
        entries: &[UndoAction],
        backend: &dyn SheetBackend,
    ) -> AppResult<UndoOutcome> {
        let mut undone = 0;
        for action in entries {
            match apply_inverse(action, backend).await {
                Ok(()) => {
                    self.store.delete_undo(action.id)?;
                    undone += 1;
                    debug!(target = %action.target, sheet = %action.sheet, "undid action");
                }
                Err(e) => {
                    warn!(target = %action.target, error = %e, "inverse failed, stopping undo");
                    return Ok(UndoOutcome {
                        undone,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        Ok(UndoOutcome {
            undone,
            error: None,
        })
    }
}

#[async_trait]
impl UndoLedger for StoreLedger {
    async fn start_batch(&self) -> u64 {
        let id = self.next_batch_id();
        let mut open = self.open_batch.lock().unwrap_or_else(|e| e.into_inner());
        *open = Some(id);
        id
    }

    async fn end_batch(&self) {
        let mut open = self.open_batch.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = open.take() {
            self.last_batch.store(id, Ordering::SeqCst);
        }
    }

    async fn record(&self, mut action: UndoAction) -> AppResult<()> {
        if action.batch_id == 0 {
            let open = self.open_batch.lock().unwrap_or_else(|e| e.into_inner());
            action.batch_id = open.unwrap_or(0);
        }
        self.store.insert_undo(&action)?;
        Ok(())
    }

    async fn undo_last(
        &self,
        conversation_id: &str,
        backend: &dyn SheetBackend,
    ) -> AppResult<UndoOutcome> {
        let pending = self.store.pending_undo(conversation_id)?;
        let Some(first) = pending.first() else {
            return Ok(UndoOutcome::empty());
        };
        let batch = first.batch_id;
        let entries: Vec<UndoAction> = if batch == 0 {
            vec![first.clone()]
        } else {
            pending
                .iter()
                .take_while(|a| a.batch_id == batch)
                .cloned()
                .collect()
        };
        self.undo_entries(&entries, backend).await
    }

    async fn undo_conversation(
        &self,
        conversation_id: &str,
        backend: &dyn SheetBackend,
    ) -> AppResult<UndoOutcome> {
        let pending = self.store.pending_undo(conversation_id)?;
        if pending.is_empty() {
            return Ok(UndoOutcome::empty());
        }
        let max_batch = pending.iter().map(|a| a.batch_id).max().unwrap_or(0);
        let entries: Vec<UndoAction> = if max_batch == 0 {
            vec![pending[0].clone()]
        } else {
            pending
                .iter()
                .filter(|a| a.batch_id == max_batch)
                .cloned()
                .collect()
        };
        self.undo_entries(&entries, backend).await
    }

    async fn approve_batch(&self, conversation_id: &str, batch_id: u64) -> AppResult<usize> {
        self.store.approve_batch(conversation_id, batch_id)
    }

    async fn last_batch_id(&self) -> u64 {
        self.last_batch.load(Ordering::SeqCst)
    }

    async fn pending_count(&self, conversation_id: &str) -> AppResult<usize> {
        Ok(self.store.pending_undo(conversation_id)?.len())
    }
}

/// Replay one entry's inverse against the backend. Every reversible
/// operation funnels through here so forward and inverse semantics stay in
/// one place.
pub async fn apply_inverse(action: &UndoAction, backend: &dyn SheetBackend) -> CoreResult<()> {
    let sheet = action.sheet.as_str();
    match &action.operation {
        UndoOperation::RestoreCell { cell, old_value } => {
            backend.write_cell(sheet, cell, old_value.clone()).await
        }
        UndoOperation::RestoreRange { range, old_values }
        | UndoOperation::RestoreSort { range, old_values } => {
            backend.write_range(sheet, range, old_values.clone()).await
        }
        UndoOperation::RemoveSheet { name } => backend.delete_sheet(name).await,
        UndoOperation::RenameSheet { from, to } => backend.rename_sheet(from, to).await,
        UndoOperation::RestoreSheet { name, cells } => {
            backend.restore_sheet(name, cells.clone()).await
        }
        UndoOperation::ReinsertRows { row, rows } => {
            backend.insert_rows(sheet, *row, rows.len() as u32).await?;
            let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
            if width > 0 {
                let range = range_name(
                    (*row, 1),
                    (*row + rows.len() as u32 - 1, width),
                );
                backend.write_range(sheet, &range, rows.clone()).await?;
            }
            Ok(())
        }
        UndoOperation::RemoveRows { row, count } => backend.delete_rows(sheet, *row, *count).await,
        UndoOperation::Unmerge { range } => backend.unmerge_cells(sheet, range).await,
        UndoOperation::Merge { range } => backend.merge_cells(sheet, range).await,
        UndoOperation::RestoreColumnWidth { column, width } => {
            backend.set_column_width(sheet, column, *width).await
        }
        UndoOperation::RestoreRowHeight { row, height } => {
            backend.set_row_height(sheet, *row, *height).await
        }
        UndoOperation::ClearFilter => backend.clear_filter(sheet).await,
        UndoOperation::RestoreFilter { state } => backend.apply_filter(sheet, state.clone()).await,
        UndoOperation::RestoreBorders { range, style } => {
            backend.set_borders(sheet, range, style.as_deref()).await
        }
        UndoOperation::RestoreFormats { snapshot } => {
            backend.restore_formats(sheet, snapshot.clone()).await
        }
        UndoOperation::RemoveChart { name } => backend.delete_chart(sheet, name).await,
        UndoOperation::RemoveTable { name } => backend.delete_table(sheet, name).await,
        UndoOperation::RemovePivot { name } => backend.delete_pivot(sheet, name).await,
        UndoOperation::None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellflow_tools::MemoryWorkbook;
    use serde_json::json;

    #[tokio::test]
    async fn test_batch_ids_strictly_increase() {
        let ledger = StoreLedger::in_memory();
        let a = ledger.start_batch().await;
        ledger.end_batch().await;
        let b = ledger.start_batch().await;
        ledger.end_batch().await;
        assert!(b > a);
        assert_eq!(ledger.last_batch_id().await, b);
    }

    #[tokio::test]
    async fn test_record_tags_open_batch() {
        let ledger = StoreLedger::in_memory();
        ledger
            .record(UndoAction::new("c1", "S", "A1", UndoOperation::None))
            .await
            .unwrap();
        let batch = ledger.start_batch().await;
        ledger
            .record(UndoAction::new("c1", "S", "A2", UndoOperation::None))
            .await
            .unwrap();
        ledger.end_batch().await;
        ledger
            .record(UndoAction::new("c1", "S", "A3", UndoOperation::None))
            .await
            .unwrap();

        let pending = ledger.store.pending_undo("c1").unwrap();
        assert_eq!(pending.len(), 3);
        // Newest-first: A3 (unbatched), A2 (batched), A1 (unbatched)
        assert_eq!(pending[0].batch_id, 0);
        assert_eq!(pending[1].batch_id, batch);
        assert_eq!(pending[2].batch_id, 0);
    }

    #[tokio::test]
    async fn test_undo_last_single_entry() {
        let wb = MemoryWorkbook::new();
        wb.write_cell("Sheet1", "A1", json!("new")).await.unwrap();

        let ledger = StoreLedger::in_memory();
        ledger
            .record(UndoAction::new(
                "c1",
                "Sheet1",
                "A1",
                UndoOperation::RestoreCell {
                    cell: "A1".to_string(),
                    old_value: json!("old"),
                },
            ))
            .await
            .unwrap();

        let outcome = ledger.undo_last("c1", &wb).await.unwrap();
        assert_eq!(outcome.undone, 1);
        assert!(outcome.error.is_none());
        assert_eq!(wb.cell_value("Sheet1", "A1").await.unwrap(), json!("old"));
        assert_eq!(ledger.pending_count("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_undo_cascades_through_batch() {
        let wb = MemoryWorkbook::new();
        wb.create_sheet("X").await.unwrap();
        wb.write_cell("Sheet1", "A1", json!("after")).await.unwrap();

        let ledger = StoreLedger::in_memory();
        ledger.start_batch().await;
        ledger
            .record(UndoAction::new(
                "c1",
                "",
                "X",
                UndoOperation::RemoveSheet {
                    name: "X".to_string(),
                },
            ))
            .await
            .unwrap();
        ledger
            .record(UndoAction::new(
                "c1",
                "Sheet1",
                "A1",
                UndoOperation::RestoreCell {
                    cell: "A1".to_string(),
                    old_value: json!(null),
                },
            ))
            .await
            .unwrap();
        ledger.end_batch().await;

        let outcome = ledger.undo_last("c1", &wb).await.unwrap();
        assert_eq!(outcome.undone, 2);
        assert!(!wb.sheet_exists("X").await.unwrap());
        assert_eq!(
            wb.cell_value("Sheet1", "A1").await.unwrap(),
            serde_json::Value::Null
        );
    }

    #[tokio::test]
    async fn test_undo_stops_at_inverse_failure() {
        let wb = MemoryWorkbook::new();
        wb.write_cell("Sheet1", "A1", json!("x")).await.unwrap();

        let ledger = StoreLedger::in_memory();
        ledger.start_batch().await;
        // Recorded first, undone last: targets a sheet that does not exist
        ledger
            .record(UndoAction::new(
                "c1",
                "",
                "Ghost",
                UndoOperation::RemoveSheet {
                    name: "Ghost".to_string(),
                },
            ))
            .await
            .unwrap();
        ledger
            .record(UndoAction::new(
                "c1",
                "Sheet1",
                "A1",
                UndoOperation::RestoreCell {
                    cell: "A1".to_string(),
                    old_value: json!(null),
                },
            ))
            .await
            .unwrap();
        ledger.end_batch().await;

        let outcome = ledger.undo_last("c1", &wb).await.unwrap();
        assert_eq!(outcome.undone, 1);
        assert!(outcome.error.is_some());
        // The failed entry stays pending
        assert_eq!(ledger.pending_count("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_undo_conversation_targets_max_batch() {
        let wb = MemoryWorkbook::new();
        wb.create_sheet("Old").await.unwrap();
        wb.create_sheet("New").await.unwrap();

        let ledger = StoreLedger::in_memory();
        ledger.start_batch().await;
        ledger
            .record(UndoAction::new(
                "c1",
                "",
                "Old",
                UndoOperation::RemoveSheet {
                    name: "Old".to_string(),
                },
            ))
            .await
            .unwrap();
        ledger.end_batch().await;
        ledger.start_batch().await;
        ledger
            .record(UndoAction::new(
                "c1",
                "",
                "New",
                UndoOperation::RemoveSheet {
                    name: "New".to_string(),
                },
            ))
            .await
            .unwrap();
        ledger.end_batch().await;

        let outcome = ledger.undo_conversation("c1", &wb).await.unwrap();
        assert_eq!(outcome.undone, 1);
        // Only the newest batch was replayed
        assert!(!wb.sheet_exists("New").await.unwrap());
        assert!(wb.sheet_exists("Old").await.unwrap());
        assert_eq!(ledger.pending_count("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_approved_batch_excluded_from_undo() {
        let wb = MemoryWorkbook::new();
        wb.create_sheet("Keep").await.unwrap();

        let ledger = StoreLedger::in_memory();
        let batch = ledger.start_batch().await;
        ledger
            .record(UndoAction::new(
                "c1",
                "",
                "Keep",
                UndoOperation::RemoveSheet {
                    name: "Keep".to_string(),
                },
            ))
            .await
            .unwrap();
        ledger.end_batch().await;

        assert_eq!(ledger.approve_batch("c1", batch).await.unwrap(), 1);
        let outcome = ledger.undo_last("c1", &wb).await.unwrap();
        assert_eq!(outcome.undone, 0);
        assert!(wb.sheet_exists("Keep").await.unwrap());
    }
}
