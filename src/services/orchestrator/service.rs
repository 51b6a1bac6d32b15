//! Orchestrator
//!
//! One explicit state object owning the worker pool, tagged result cache,
//! failure memo, mode controller, and quick classifier. All orchestration
//! state lives here; nothing is global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};

use cellflow_core::{decode_action, tags_for, CommandKind, CoreError, ToolCommand};
use cellflow_tools::ToolResult;

use crate::models::{Task, TaskResult};
use crate::services::executor::ToolExecutor;
use crate::services::orchestrator::cache::{cache_key, ResultCache};
use crate::services::orchestrator::classifier::{Classification, QuickClassifier};
use crate::services::orchestrator::failure::FailureMemo;
use crate::services::orchestrator::mode::{ModeController, EVALUATION_INTERVAL_SECS};
use crate::services::orchestrator::worker_pool::{
    TaskRunner, WorkerPool, DEFAULT_WORKERS, STALL_THRESHOLD,
};

/// Conversation id undo entries of orchestrated actions are attributed to.
const ORCHESTRATOR_CONVERSATION: &str = "orchestrator";

/// Runs tasks through the tool executor.
struct ExecutorRunner {
    executor: Arc<ToolExecutor>,
}

#[async_trait::async_trait]
impl TaskRunner for ExecutorRunner {
    async fn run(&self, task: &Task) -> ToolResult {
        let command = ToolCommand {
            kind: task.kind,
            payload: task_payload(task),
        };
        match self
            .executor
            .execute(ORCHESTRATOR_CONVERSATION, &command)
            .await
        {
            Ok(output) => ToolResult::ok(output),
            Err(e) => ToolResult::err(e.to_string()),
        }
    }
}

/// Rebuild the wire payload from a task's name and arguments.
fn task_payload(task: &Task) -> Value {
    let mut payload = match &task.arguments {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    payload.insert(
        "operation".to_string(),
        Value::String(task.tool_name.clone()),
    );
    Value::Object(payload)
}

pub struct Orchestrator {
    pool: WorkerPool,
    cache: Arc<ResultCache>,
    memo: Arc<FailureMemo>,
    mode: Arc<ModeController>,
    classifier: QuickClassifier,
    // Single-flight guard so identical concurrent queries hit the executor once
    key_locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    /// Orchestrator over a tool executor with the default worker count.
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self::with_runner(Arc::new(ExecutorRunner { executor }), DEFAULT_WORKERS)
    }

    /// Orchestrator over an arbitrary runner (tests, custom backends).
    pub fn with_runner(runner: Arc<dyn TaskRunner>, workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(runner, workers),
            cache: Arc::new(ResultCache::new()),
            memo: Arc::new(FailureMemo::new()),
            mode: Arc::new(ModeController::new()),
            classifier: QuickClassifier::new(),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn mode(&self) -> &ModeController {
        &self.mode
    }

    pub fn failures(&self) -> &FailureMemo {
        &self.memo
    }

    /// Fast-path classification for a user message.
    pub fn classify(&self, text: &str, sheet: &str) -> Classification {
        self.classifier.classify(text, sheet)
    }

    fn key_lock(&self, key: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Submit one task: recurrent keys short-circuit, queries are served
    /// from cache when live, actions invalidate the tags they touch.
    pub async fn submit(&self, task: Task) -> TaskResult {
        let key = cache_key(&task.tool_name, &task.arguments);
        let memo_key = format!("{}:{key:x}", task.tool_name);

        if self.memo.is_recurrent(&memo_key) {
            let last = self
                .memo
                .last_error(&memo_key)
                .unwrap_or_else(|| "unknown error".to_string());
            warn!(task_id = %task.id, tool = %task.tool_name, "short-circuiting recurrent task");
            let error = CoreError::recurrent(format!("not retried: {last}"));
            return TaskResult::err(task.id.clone(), error.to_string(), 0);
        }

        match task.kind {
            CommandKind::Query => self.submit_query(task, key, &memo_key).await,
            CommandKind::Action => self.submit_action(task, &memo_key).await,
        }
    }

    async fn submit_query(&self, task: Task, key: u64, memo_key: &str) -> TaskResult {
        if let Some(hit) = self.cache.get(key) {
            return TaskResult::ok(task.id.clone(), hit, 0).cached();
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        // A duplicate may have filled the cache while we waited
        if let Some(hit) = self.cache.get(key) {
            return TaskResult::ok(task.id.clone(), hit, 0).cached();
        }

        let tags = tags_for(&task.tool_name, &task.arguments);
        let result = self.dispatch(task, memo_key).await;
        if result.success {
            if let Some(output) = &result.output {
                self.cache.set(key, output.clone(), tags);
            }
        }
        result
    }

    async fn submit_action(&self, task: Task, memo_key: &str) -> TaskResult {
        let touched = match decode_action(task_payload(&task)) {
            Ok(op) => op.touched_tags(),
            Err(_) => tags_for(&task.tool_name, &task.arguments),
        };

        let result = self.dispatch(task, memo_key).await;
        if result.success {
            let evicted = self.cache.invalidate_tags(&touched);
            if evicted > 0 {
                info!(evicted, "action invalidated cached queries");
            }
        }
        result
    }

    async fn dispatch(&self, task: Task, memo_key: &str) -> TaskResult {
        let task_id = task.id.clone();
        let started = Instant::now();
        let rx = self.pool.submit(task);
        let outcome = rx.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                self.mode.record(result.success);
                if result.success {
                    self.memo.record_success(memo_key);
                    TaskResult::ok(task_id, result.output.unwrap_or_default(), duration_ms)
                } else {
                    let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                    self.memo.record_failure(memo_key, error.clone());
                    TaskResult::err(task_id, error, duration_ms)
                }
            }
            Err(_) => {
                self.mode.record(false);
                self.memo.record_failure(memo_key, "worker dropped task");
                TaskResult::err(task_id, "worker dropped task", duration_ms)
            }
        }
    }

    /// One health tick: re-evaluate the mode, apply its cache TTL, sweep
    /// expired entries, and report stalled workers.
    pub fn health_tick(&self) {
        if let Some(mode) = self.mode.evaluate() {
            self.cache.set_default_ttl(mode.cache_ttl());
        }
        let swept = self.cache.cleanup();
        if swept > 0 {
            info!(swept, "cache sweep purged expired entries");
        }
        let stalled = self.pool.stalled_workers(STALL_THRESHOLD);
        if !stalled.is_empty() {
            warn!(?stalled, "workers stalled past threshold");
        }
    }

    /// Periodic health loop, one tick every 10 s until the orchestrator is
    /// dropped.
    pub fn run_health_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(EVALUATION_INTERVAL_SECS));
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                orchestrator.health_tick();
            }
        })
    }
}
