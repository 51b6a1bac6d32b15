//! Orchestrator Integration Tests
//!
//! Drives the orchestrator over a real executor and workbook: caching,
//! invalidation by action, failure memoization, and mode degradation.

use std::sync::Arc;

use serde_json::json;

use cellflow::models::{OperationMode, Priority, Task};
use cellflow::services::orchestrator::cache_key;
use cellflow::services::{Orchestrator, StoreLedger, ToolExecutor};
use cellflow_tools::MemoryWorkbook;

fn orchestrator() -> Arc<Orchestrator> {
    let backend = Arc::new(MemoryWorkbook::new());
    let ledger = Arc::new(StoreLedger::in_memory());
    let executor = Arc::new(ToolExecutor::new(backend, ledger));
    Arc::new(Orchestrator::new(executor))
}

#[test]
fn test_cache_key_ignores_argument_order() {
    let a = json!({"sheet": "Vendas", "range": "A1:B2"});
    let b = json!({"range": "A1:B2", "sheet": "Vendas"});
    assert_eq!(cache_key("read_range", &a), cache_key("read_range", &b));
    assert_ne!(
        cache_key("read_range", &a),
        cache_key("get_used_range", &a)
    );
}

#[tokio::test]
async fn test_query_cached_until_action_touches_sheet() {
    let orchestrator = orchestrator();

    let first = orchestrator
        .submit(Task::query("list_sheets", json!({})))
        .await;
    assert!(first.success);
    assert!(!first.from_cache);
    assert_eq!(first.output.as_deref(), Some("Sheet1"));

    let second = orchestrator
        .submit(Task::query("list_sheets", json!({})))
        .await;
    assert!(second.from_cache);

    // Creating a sheet touches the workbook tag and evicts the entry
    let action = orchestrator
        .submit(Task::action("create_sheet", json!({"name": "Vendas"})))
        .await;
    assert!(action.success);

    let third = orchestrator
        .submit(Task::query("list_sheets", json!({})))
        .await;
    assert!(!third.from_cache);
    assert_eq!(third.output.as_deref(), Some("Sheet1, Vendas"));
}

#[tokio::test]
async fn test_action_on_one_sheet_keeps_other_sheets_cached() {
    let orchestrator = orchestrator();
    orchestrator
        .submit(Task::action("create_sheet", json!({"name": "Outra"})))
        .await;

    orchestrator
        .submit(Task::query("get_used_range", json!({"sheet": "Sheet1"})))
        .await;
    orchestrator
        .submit(Task::query("get_used_range", json!({"sheet": "Outra"})))
        .await;
    assert_eq!(orchestrator.cache().len(), 2);

    orchestrator
        .submit(Task::action(
            "write_cell",
            json!({"sheet": "Sheet1", "cell": "A1", "value": 7}),
        ))
        .await;

    let untouched = orchestrator
        .submit(Task::query("get_used_range", json!({"sheet": "Outra"})))
        .await;
    assert!(untouched.from_cache);
    let touched = orchestrator
        .submit(Task::query("get_used_range", json!({"sheet": "Sheet1"})))
        .await;
    assert!(!touched.from_cache);
    assert_eq!(touched.output.as_deref(), Some("A1:A1"));
}

#[tokio::test]
async fn test_concurrent_identical_queries_coalesce() {
    let orchestrator = orchestrator();
    let (a, b, c) = tokio::join!(
        orchestrator.submit(Task::query("list_sheets", json!({}))),
        orchestrator.submit(Task::query("list_sheets", json!({}))),
        orchestrator.submit(Task::query("list_sheets", json!({}))),
    );
    assert!(a.success && b.success && c.success);
    let cached = [&a, &b, &c].iter().filter(|r| r.from_cache).count();
    assert_eq!(cached, 2);
}

#[tokio::test]
async fn test_recurrent_failure_memoized_at_three() {
    let orchestrator = orchestrator();
    let args = json!({"sheet": "Fantasma"});

    for _ in 0..3 {
        let result = orchestrator
            .submit(Task::query("get_used_range", args.clone()))
            .await;
        assert!(!result.success);
    }

    let short_circuited = orchestrator
        .submit(Task::query("get_used_range", args.clone()))
        .await;
    assert!(!short_circuited.success);
    assert!(short_circuited
        .error
        .as_deref()
        .unwrap()
        .contains("Recurrent failure"));

    // A different argument set is a different key and still dispatches
    let other = orchestrator
        .submit(Task::query("get_used_range", json!({"sheet": "Sheet1"})))
        .await;
    assert!(other.success);
}

#[tokio::test]
async fn test_mode_degrades_and_recovers_across_ticks() {
    let orchestrator = orchestrator();
    assert_eq!(orchestrator.mode().current(), OperationMode::Normal);

    // All failures this window
    for i in 0..4 {
        orchestrator
            .submit(Task::query(
                "get_used_range",
                json!({"sheet": format!("nope{i}")}),
            ))
            .await;
    }
    orchestrator.health_tick();
    assert_eq!(orchestrator.mode().current(), OperationMode::Critical);

    // A healthy window brings it straight back
    for _ in 0..4 {
        orchestrator
            .submit(Task::query("list_sheets", json!({})))
            .await;
    }
    orchestrator.health_tick();
    assert_eq!(orchestrator.mode().current(), OperationMode::Normal);
}

#[tokio::test]
async fn test_priority_is_accepted_on_submission() {
    let orchestrator = orchestrator();
    let result = orchestrator
        .submit(Task::query("list_sheets", json!({})).with_priority(Priority::Urgent))
        .await;
    assert!(result.success);
}
