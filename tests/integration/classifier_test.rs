//! Quick Classifier Integration Tests
//!
//! Verifies that trivial requests resolve entirely on the fast path: a
//! literal pattern becomes a direct tool call executed without a single
//! model invocation.

use std::sync::Arc;

use serde_json::json;

use cellflow::services::orchestrator::Classification;
use cellflow::services::{Orchestrator, StoreLedger, ToolExecutor};
use cellflow_llm::ScriptedBackend;
use cellflow_tools::{MemoryWorkbook, SheetBackend};

fn setup() -> (Arc<MemoryWorkbook>, Arc<ScriptedBackend>, Arc<Orchestrator>) {
    let backend = Arc::new(MemoryWorkbook::new());
    let ledger = Arc::new(StoreLedger::in_memory());
    let executor = Arc::new(ToolExecutor::new(backend.clone(), ledger));
    let model = Arc::new(ScriptedBackend::single("should never be called"));
    let orchestrator = Arc::new(Orchestrator::new(executor));
    (backend, model, orchestrator)
}

#[tokio::test]
async fn test_liste_as_abas_bypasses_the_model() {
    let (backend, model, orchestrator) = setup();
    backend.create_sheet("Vendas").await.unwrap();

    let decision = orchestrator.classify("liste as abas", "Sheet1");
    let Classification::Direct(command) = decision else {
        panic!("expected a direct classification");
    };

    // The command runs straight through the executor path
    let executor = Arc::new(ToolExecutor::new(
        backend.clone(),
        Arc::new(StoreLedger::in_memory()),
    ));
    let output = executor.execute("c1", &command).await.unwrap();
    assert_eq!(output, "Sheet1, Vendas");
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_destructive_request_is_gated() {
    let (_, model, orchestrator) = setup();
    let decision = orchestrator.classify("apagar a aba Vendas", "Sheet1");
    assert!(matches!(
        decision,
        Classification::NeedsConfirmation { .. }
    ));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_chart_heuristic_targets_active_sheet() {
    let (_, _, orchestrator) = setup();
    let decision = orchestrator.classify("crie um gráfico de B2:D8", "Vendas");
    let Classification::Direct(command) = decision else {
        panic!("expected a direct classification");
    };
    assert_eq!(command.operation(), Some("create_chart"));
    assert_eq!(command.payload["sheet"], json!("Vendas"));
    assert_eq!(command.payload["range"], json!("B2:D8"));
}

#[tokio::test]
async fn test_open_ended_request_goes_to_planning() {
    let (_, _, orchestrator) = setup();
    assert_eq!(
        orchestrator.classify("analise as vendas do trimestre e resuma", "Sheet1"),
        Classification::Planned
    );
}
