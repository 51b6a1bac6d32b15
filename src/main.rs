//! Cellflow demo binary
//!
//! Runs one agent turn against an in-memory workbook with a scripted model,
//! streaming the response to stdout. Useful as a dry run of the full control
//! loop without a provider or a spreadsheet host attached.

use std::io::Write;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cellflow::services::{AgentConfig, AgentLoop, EventSink, StoreLedger, ToolExecutor, UndoLedger};
use cellflow::storage::MemoryStore;
use cellflow_core::StreamEvent;
use cellflow_llm::ScriptedBackend;
use cellflow_tools::MemoryWorkbook;

fn scripted_responses() -> Vec<String> {
    vec![
        concat!(
            "Writing a small demo table first.\n",
            "```action\n",
            "{\"operation\":\"write_range\",\"sheet\":\"Sheet1\",\"range\":\"A1:B3\",",
            "\"values\":[[\"Produto\",\"Total\"],[\"Caneta\",120],[\"Caderno\",85]]}\n",
            "```"
        )
        .to_string(),
        concat!(
            "Now reading it back.\n",
            "```query\n",
            "{\"operation\":\"get_range_values\",\"sheet\":\"Sheet1\",\"range\":\"A1:B3\"}\n",
            "```"
        )
        .to_string(),
        "The table has two products; Caneta leads with 120.".to_string(),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Monte uma tabela de demonstração".to_string());

    let backend = Arc::new(MemoryWorkbook::new());
    let ledger = Arc::new(StoreLedger::in_memory());
    let executor = Arc::new(ToolExecutor::new(backend, ledger.clone()));
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(ScriptedBackend::new(scripted_responses()));
    let agent = AgentLoop::new(model, executor, store, AgentConfig::default());

    let sink: EventSink = Arc::new(|event| match event {
        StreamEvent::TextDelta { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        StreamEvent::StepStarted { step, max_steps } => {
            eprintln!("\n--- step {step}/{max_steps} ---");
        }
        StreamEvent::StepLimitReached { steps } => {
            eprintln!("\n[step limit of {steps} reached]");
        }
        StreamEvent::Error { message } => {
            eprintln!("\n[error] {message}");
        }
        _ => {}
    });

    agent.send_message("demo", &prompt, false, sink).await?;
    println!();
    println!("pending undo entries: {}", ledger.pending_count("demo").await?);
    Ok(())
}
