//! Integration Tests Module
//!
//! End-to-end tests over the public crate API: command parsing, tool
//! execution with undo capture, the bounded agent loop, the parallel
//! orchestrator, and the quick classifier.

// Command parser over fenced model output
mod parser_test;

// Tool executor + undo ledger round trips
mod executor_test;

// Undo cascade and approval semantics
mod undo_test;

// Agent loop: approvals, step cap, cancellation
mod agent_loop_test;

// Orchestrator: cache, memoization, modes
mod orchestrator_test;

// Quick classifier fast paths
mod classifier_test;
