//! Tool Executor Integration Tests
//!
//! Runs parsed commands end to end against the in-memory workbook and
//! verifies that actions leave working undo entries behind.

use std::sync::Arc;

use serde_json::json;

use cellflow::services::{StoreLedger, ToolExecutor};
use cellflow_core::ToolCommand;
use cellflow_tools::{MemoryWorkbook, SheetBackend};

fn executor() -> (Arc<MemoryWorkbook>, ToolExecutor) {
    let backend = Arc::new(MemoryWorkbook::new());
    let ledger = Arc::new(StoreLedger::in_memory());
    let executor = ToolExecutor::new(backend.clone(), ledger);
    (backend, executor)
}

#[tokio::test]
async fn test_write_then_read_through_commands() {
    let (_, executor) = executor();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "write_range", "sheet": "Sheet1", "range": "A1:B2",
                "values": [["Produto", "Total"], ["Caneta", 120]]
            })),
        )
        .await
        .unwrap();

    let rows = executor
        .execute(
            "c1",
            &ToolCommand::query(json!({
                "operation": "get_range_values", "sheet": "Sheet1", "range": "A1:B2"
            })),
        )
        .await
        .unwrap();
    assert_eq!(rows, "Produto\tTotal\nCaneta\t120");
}

#[tokio::test]
async fn test_sheet_lifecycle_with_undo() {
    let (backend, executor) = executor();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({"operation": "create_sheet", "name": "Vendas"})),
        )
        .await
        .unwrap();
    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "rename_sheet", "from": "Vendas", "to": "Vendas2024"
            })),
        )
        .await
        .unwrap();
    assert!(backend.sheet_exists("Vendas2024").await.unwrap());

    // Newest entry first: undo the rename, then the create
    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert!(backend.sheet_exists("Vendas").await.unwrap());
    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert!(!backend.sheet_exists("Vendas").await.unwrap());
}

#[tokio::test]
async fn test_delete_sheet_restores_full_contents() {
    let (backend, executor) = executor();
    backend.create_sheet("Dados").await.unwrap();
    backend
        .write_cell("Dados", "C3", json!(3.14))
        .await
        .unwrap();

    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({"operation": "delete_sheet", "name": "Dados"})),
        )
        .await
        .unwrap();
    assert!(!backend.sheet_exists("Dados").await.unwrap());

    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(backend.cell_value("Dados", "C3").await.unwrap(), json!(3.14));
}

#[tokio::test]
async fn test_macro_batch_aborts_and_undoes_as_unit() {
    let (backend, executor) = executor();
    let result = executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "macro",
                "actions": [
                    {"operation": "create_sheet", "name": "X"},
                    {"operation": "write_cell", "sheet": "X", "cell": "A1", "value": 1},
                    {"operation": "write_cell", "sheet": "Missing", "cell": "A1", "value": 2},
                    {"operation": "write_cell", "sheet": "X", "cell": "B1", "value": 3}
                ]
            })),
        )
        .await
        .unwrap();

    let lines: Vec<&str> = result.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("ERROR:"));

    let outcome = executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(outcome.undone, 2);
    assert!(!backend.sheet_exists("X").await.unwrap());
    assert_eq!(executor.ledger().pending_count("c1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_sort_and_filter_round_trip() {
    let (backend, executor) = executor();
    backend
        .write_range(
            "Sheet1",
            "A1:A3",
            vec![vec![json!(3)], vec![json!(1)], vec![json!(2)]],
        )
        .await
        .unwrap();

    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "sort_range", "sheet": "Sheet1", "range": "A1:A3",
                "column": 0, "ascending": true
            })),
        )
        .await
        .unwrap();
    assert_eq!(backend.cell_value("Sheet1", "A1").await.unwrap(), json!(1));

    executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "apply_filter", "sheet": "Sheet1", "range": "A1:A3",
                "column": 0, "criteria": ">1"
            })),
        )
        .await
        .unwrap();
    assert!(backend.has_filter("Sheet1").await.unwrap());

    // Undo the filter, then the sort
    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert!(!backend.has_filter("Sheet1").await.unwrap());
    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert_eq!(backend.cell_value("Sheet1", "A1").await.unwrap(), json!(3));
}

#[tokio::test]
async fn test_chart_creation_names_and_undoes() {
    let (backend, executor) = executor();
    backend
        .write_range("Sheet1", "A1:B2", vec![vec![json!("a"), json!(1)]])
        .await
        .unwrap();

    let line = executor
        .execute(
            "c1",
            &ToolCommand::action(json!({
                "operation": "create_chart", "sheet": "Sheet1", "range": "A1:B2",
                "chart_type": "column", "title": ""
            })),
        )
        .await
        .unwrap();
    assert!(line.contains("Chart1"));
    assert_eq!(backend.list_charts("Sheet1").await.unwrap(), vec!["Chart1"]);

    executor
        .ledger()
        .undo_last("c1", backend.as_ref())
        .await
        .unwrap();
    assert!(backend.list_charts("Sheet1").await.unwrap().is_empty());
}
