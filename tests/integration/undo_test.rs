//! Undo Ledger Integration Tests
//!
//! Undo semantics over the persistent SQLite store: cascade, approval, and
//! survival of entries across ledger instances sharing one store.

use std::sync::Arc;

use serde_json::json;

use cellflow::services::{StoreLedger, ToolExecutor, UndoLedger};
use cellflow::storage::{ConversationStore, SqliteStore};
use cellflow_core::ToolCommand;
use cellflow_tools::{MemoryWorkbook, SheetBackend};

fn sqlite_executor() -> (Arc<MemoryWorkbook>, Arc<SqliteStore>, ToolExecutor) {
    let backend = Arc::new(MemoryWorkbook::new());
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let ledger = Arc::new(StoreLedger::new(store.clone()));
    let executor = ToolExecutor::new(backend.clone(), ledger);
    (backend, store, executor)
}

#[tokio::test]
async fn test_undo_entries_persist_in_sqlite() {
    let (backend, store, executor) = sqlite_executor();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "write_cell", "sheet": "Sheet1", "cell": "A1", "value": "x"
            })),
        )
        .await
        .unwrap();

    let pending = store.pending_undo("c1").unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].sheet, "Sheet1");
    assert_eq!(pending[0].target, "A1");

    // A fresh ledger over the same store still sees and replays the entry
    let revived = StoreLedger::new(store.clone());
    let outcome = revived.undo_last("c1", backend.as_ref()).await.unwrap();
    assert_eq!(outcome.undone, 1);
    assert_eq!(
        backend.cell_value("Sheet1", "A1").await.unwrap(),
        serde_json::Value::Null
    );
    assert!(store.pending_undo("c1").unwrap().is_empty());
}

#[tokio::test]
async fn test_macro_batch_cascades_in_sqlite() {
    let (backend, store, executor) = sqlite_executor();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "macro",
                "actions": [
                    {"operation": "create_sheet", "name": "Q1"},
                    {"operation": "write_cell", "sheet": "Q1", "cell": "A1", "value": 10}
                ]
            })),
        )
        .await
        .unwrap();

    let pending = store.pending_undo("c1").unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].batch_id, pending[1].batch_id);
    assert_ne!(pending[0].batch_id, 0);

    let outcome = executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(outcome.undone, 2);
    assert!(!backend.sheet_exists("Q1").await.unwrap());
}

#[tokio::test]
async fn test_approved_batch_survives_undo_requests() {
    let (backend, _, executor) = sqlite_executor();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "macro",
                "actions": [{"operation": "create_sheet", "name": "Final"}]
            })),
        )
        .await
        .unwrap();

    let batch = executor.ledger().last_batch_id().await;
    assert_ne!(batch, 0);
    assert_eq!(executor.ledger().approve_batch("c1", batch).await.unwrap(), 1);

    let outcome = executor
        .ledger()
        .undo_conversation("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(outcome.undone, 0);
    assert!(backend.sheet_exists("Final").await.unwrap());
}

#[tokio::test]
async fn test_conversations_are_isolated() {
    let (backend, _, executor) = sqlite_executor();
    for conversation in ["c1", "c2"] {
        executor
            .execute(
                conversation,
                &ToolCommand::action(json!({
                    "operation": "write_cell", "sheet": "Sheet1",
                    "cell": "A1", "value": conversation
                })),
            )
            .await
            .unwrap();
    }

    // Undoing c1 must not consume c2's entry
    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(executor.ledger().pending_count("c1").await.unwrap(), 0);
    assert_eq!(executor.ledger().pending_count("c2").await.unwrap(), 1);
}

#[tokio::test]
async fn test_undo_entries_survive_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");

    let backend = Arc::new(MemoryWorkbook::new());
    {
        let store = Arc::new(SqliteStore::open(&db_path).unwrap());
        let executor = ToolExecutor::new(backend.clone(), Arc::new(StoreLedger::new(store)));
        executor
            .execute(
                "c1",
                &ToolCommand::action(json!({
                    "operation": "write_cell", "sheet": "Sheet1", "cell": "A1", "value": "x"
                })),
            )
            .await
            .unwrap();
    }

    // A store opened on the same file sees and replays the entry
    let reopened = Arc::new(SqliteStore::open(&db_path).unwrap());
    let ledger = StoreLedger::new(reopened.clone());
    assert_eq!(ledger.pending_count("c1").await.unwrap(), 1);
    let outcome = ledger.undo_last("c1", backend.as_ref()).await.unwrap();
    assert_eq!(outcome.undone, 1);
    assert!(reopened.pending_undo("c1").unwrap().is_empty());
}

#[tokio::test]
async fn test_undo_on_empty_ledger_is_noop() {
    let (backend, _, executor) = sqlite_executor();
    let outcome = executor
        .ledger()
        .undo_last("nobody", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(outcome.undone, 0);
    assert!(outcome.error.is_none());
}
