//! Worker Pool
//!
//! Parallel task execution over a bounded channel. A dispatcher drains a
//! priority heap (lowest priority value first, FIFO within a level) and
//! feeds N workers through a capacity-bounded queue; a full queue causes a
//! short-timeout retry and re-queue rather than an unbounded block.
//! Per-worker activity timestamps feed an advisory stall report.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cellflow_tools::ToolResult;

use crate::models::Task;

/// Queue capacity between dispatcher and workers.
pub const QUEUE_CAPACITY: usize = 100;
/// Default worker count.
pub const DEFAULT_WORKERS: usize = 5;
/// Activity age after which a busy worker is reported stalled.
pub const STALL_THRESHOLD: Duration = Duration::from_secs(120);

/// How a worker actually runs one task.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &Task) -> ToolResult;
}

struct QueuedTask {
    task: Task,
    reply: oneshot::Sender<ToolResult>,
    seq: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.seq == other.seq
    }
}
impl Eq for QueuedTask {}

impl Ord for QueuedTask {
    // Max-heap: urgent (lowest value) first, then FIFO by sequence
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .task
            .priority
            .cmp(&self.task.priority)
            .then(other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct WorkerState {
    busy: AtomicBool,
    last_activity: RwLock<Instant>,
}

pub struct WorkerPool {
    heap: Arc<Mutex<BinaryHeap<QueuedTask>>>,
    notify: Arc<Notify>,
    workers: Vec<Arc<WorkerState>>,
    seq: AtomicU64,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn the dispatcher and `worker_count` workers onto the current
    /// runtime.
    pub fn new(runner: Arc<dyn TaskRunner>, worker_count: usize) -> Self {
        let heap: Arc<Mutex<BinaryHeap<QueuedTask>>> = Arc::new(Mutex::new(BinaryHeap::new()));
        let notify = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();

        let (tx, rx) = mpsc::channel::<QueuedTask>(QUEUE_CAPACITY);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let state = Arc::new(WorkerState {
                busy: AtomicBool::new(false),
                last_activity: RwLock::new(Instant::now()),
            });
            workers.push(state.clone());
            let rx = rx.clone();
            let runner = runner.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let next = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            item = rx.recv() => item,
                            _ = shutdown.cancelled() => None,
                        }
                    };
                    let Some(queued) = next else { break };

                    state.busy.store(true, Ordering::SeqCst);
                    touch(&state);
                    debug!(worker_id, task_id = %queued.task.id, "task picked up");
                    let result = runner.run(&queued.task).await;
                    touch(&state);
                    state.busy.store(false, Ordering::SeqCst);
                    // Receiver may have given up waiting
                    let _ = queued.reply.send(result);
                }
            });
        }

        {
            let heap = heap.clone();
            let notify = notify.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let popped = {
                        let mut heap = heap.lock().unwrap_or_else(|e| e.into_inner());
                        heap.pop()
                    };
                    match popped {
                        Some(queued) => {
                            // Explicit backpressure: short-timeout send, then
                            // re-queue and back off when the queue stays full.
                            match tx
                                .send_timeout(queued, Duration::from_millis(100))
                                .await
                            {
                                Ok(()) => {}
                                Err(mpsc::error::SendTimeoutError::Timeout(queued)) => {
                                    warn!(task_id = %queued.task.id, "worker queue full, re-queueing");
                                    // Guard must not be held across the await
                                    {
                                        let mut heap =
                                            heap.lock().unwrap_or_else(|e| e.into_inner());
                                        heap.push(queued);
                                    }
                                    tokio::time::sleep(Duration::from_millis(50)).await;
                                }
                                Err(mpsc::error::SendTimeoutError::Closed(_)) => break,
                            }
                        }
                        None => {
                            tokio::select! {
                                _ = notify.notified() => {}
                                _ = shutdown.cancelled() => break,
                            }
                        }
                    }
                }
            });
        }

        Self {
            heap,
            notify,
            workers,
            seq: AtomicU64::new(0),
            shutdown,
        }
    }

    /// Queue a task; the returned receiver resolves with its result.
    pub fn submit(&self, task: Task) -> oneshot::Receiver<ToolResult> {
        let (reply, rx) = oneshot::channel();
        let queued = QueuedTask {
            task,
            reply,
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        };
        {
            let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
            heap.push(queued);
        }
        self.notify.notify_one();
        rx
    }

    pub fn queued_len(&self) -> usize {
        let heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.len()
    }

    /// Indices of busy workers whose last activity is older than the
    /// threshold. Advisory telemetry only; nothing is killed.
    pub fn stalled_workers(&self, threshold: Duration) -> Vec<usize> {
        let now = Instant::now();
        self.workers
            .iter()
            .enumerate()
            .filter(|(_, state)| {
                if !state.busy.load(Ordering::SeqCst) {
                    return false;
                }
                let last = *state
                    .last_activity
                    .read()
                    .unwrap_or_else(|e| e.into_inner());
                now.duration_since(last) > threshold
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn touch(state: &WorkerState) {
    let mut last = state
        .last_activity
        .write()
        .unwrap_or_else(|e| e.into_inner());
    *last = Instant::now();
}
