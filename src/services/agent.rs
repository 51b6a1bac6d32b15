//! Agent Loop
//!
//! Drives one conversational turn through bounded autonomous steps: stream
//! the model, parse commands out of the response, execute them, feed the
//! results back, repeat up to the step cap. Turns are serialized per
//! conversation; a mutating command under approval mode pauses the loop
//! until `resolve_pending` is called.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cellflow_core::{StreamEvent, ToolCommand};
use cellflow_llm::{LlmError, Message, ModelBackend, RequestOptions};

use crate::models::OperationMode;
use crate::services::executor::ToolExecutor;
use crate::services::parser::parse_commands;
use crate::storage::ConversationStore;
use crate::utils::error::{AppError, AppResult};

/// Callback receiving every stream event of a turn, unbuffered.
pub type EventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

#[derive(Clone)]
pub struct AgentConfig {
    /// Autonomous steps per turn
    pub max_steps: u32,
    /// Fixed inter-step delay, the primitive rate limit
    pub step_delay: Duration,
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            step_delay: Duration::from_millis(500),
            system_prompt: None,
        }
    }
}

/// A mutating command waiting for human approval. At most one per
/// conversation at any time.
struct PendingAction {
    command: ToolCommand,
    step: u32,
    on_event: EventSink,
}

pub struct AgentLoop {
    model: Arc<dyn ModelBackend>,
    executor: Arc<ToolExecutor>,
    store: Arc<dyn ConversationStore>,
    config: AgentConfig,
    options: RwLock<RequestOptions>,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    cancels: Mutex<HashMap<String, CancellationToken>>,
    pending: Mutex<HashMap<String, PendingAction>>,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        executor: Arc<ToolExecutor>,
        store: Arc<dyn ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            executor,
            store,
            config,
            options: RwLock::new(RequestOptions::default()),
            turn_locks: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Apply the current operation mode to subsequent planning requests
    /// (cognitive budget).
    pub fn set_mode(&self, mode: OperationMode) {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        options.max_tokens = mode.max_tokens();
        options.include_reasoning = mode.include_reasoning();
    }

    fn turn_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.turn_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn cancel_token(&self, conversation_id: &str) -> CancellationToken {
        let mut cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        let token = CancellationToken::new();
        cancels.insert(conversation_id.to_string(), token.clone());
        token
    }

    /// Cancel the in-flight model stream for a conversation. Tool effects
    /// already applied stay; reversal goes through the undo ledger.
    pub fn cancel(&self, conversation_id: &str) {
        let cancels = self.cancels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cancels.get(conversation_id) {
            token.cancel();
        }
    }

    pub fn has_pending(&self, conversation_id: &str) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.contains_key(conversation_id)
    }

    /// Run one user turn. Returns the accumulated assistant text.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        require_approval: bool,
        on_event: EventSink,
    ) -> AppResult<String> {
        let lock = self.turn_lock(conversation_id);
        let _guard = lock.lock().await;

        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.remove(conversation_id).is_some() {
                warn!(conversation_id, "discarding stale pending action");
            }
        }

        self.store
            .append_message(conversation_id, &Message::user(text))?;
        self.run_steps(conversation_id, 1, require_approval, &on_event)
            .await
    }

    /// Resolve the pending approval for a conversation. Approved: execute
    /// the saved command and continue the loop from the saved step.
    /// Rejected: discard it and record a rejection note for the model.
    pub async fn resolve_pending(
        &self,
        conversation_id: &str,
        approved: bool,
    ) -> AppResult<String> {
        let lock = self.turn_lock(conversation_id);
        let _guard = lock.lock().await;

        let saved = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(conversation_id)
        };
        let Some(saved) = saved else {
            return Err(AppError::internal("no pending action to resolve"));
        };

        if !approved {
            info!(conversation_id, "pending action rejected");
            self.store.append_message(
                conversation_id,
                &Message::tool_result(
                    "User rejected the proposed action.",
                    Some(Uuid::new_v4().to_string()),
                ),
            )?;
            (saved.on_event)(StreamEvent::Done {
                stop_reason: Some("rejected".to_string()),
            });
            return Ok(String::new());
        }

        let line = match self.executor.execute(conversation_id, &saved.command).await {
            Ok(line) => line,
            Err(e) => format!("ERROR: {e}"),
        };
        self.store.append_message(
            conversation_id,
            &Message::tool_result(line.as_str(), Some(Uuid::new_v4().to_string())),
        )?;

        // Approval already granted for this turn; keep executing freely.
        self.run_steps(conversation_id, saved.step + 1, false, &saved.on_event)
            .await
    }

    async fn run_steps(
        &self,
        conversation_id: &str,
        first_step: u32,
        require_approval: bool,
        on_event: &EventSink,
    ) -> AppResult<String> {
        let token = self.cancel_token(conversation_id);
        let max_steps = self.config.max_steps;
        let mut accumulated = String::new();

        for step in first_step..=max_steps {
            on_event(StreamEvent::StepStarted { step, max_steps });

            let text = match self.stream_step(conversation_id, on_event, &token).await {
                Ok(text) => text,
                Err(AppError::Internal(msg)) if msg == "cancelled" => {
                    info!(conversation_id, step, "turn cancelled mid-stream");
                    on_event(StreamEvent::Done {
                        stop_reason: Some("cancelled".to_string()),
                    });
                    return Ok(accumulated);
                }
                Err(e) => {
                    on_event(StreamEvent::Error {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            };

            if !accumulated.is_empty() {
                accumulated.push('\n');
            }
            accumulated.push_str(&text);
            self.store
                .append_message(conversation_id, &Message::assistant(text.as_str()))?;

            let commands = parse_commands(&text);
            if commands.is_empty() {
                debug!(conversation_id, step, "no commands, turn complete");
                on_event(StreamEvent::Done {
                    stop_reason: Some("completed".to_string()),
                });
                return Ok(accumulated);
            }

            let mut lines = Vec::new();
            let mut paused = false;
            for command in commands {
                if require_approval && command.is_mutating() {
                    let description = command.describe();
                    {
                        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                        pending.insert(
                            conversation_id.to_string(),
                            PendingAction {
                                command,
                                step,
                                on_event: on_event.clone(),
                            },
                        );
                    }
                    on_event(StreamEvent::ApprovalRequired { description });
                    paused = true;
                    break;
                }
                let line = match self.executor.execute(conversation_id, &command).await {
                    Ok(line) => line,
                    Err(e) => format!("ERROR: {e}"),
                };
                lines.push(line);
            }

            if !lines.is_empty() {
                self.store.append_message(
                    conversation_id,
                    &Message::tool_result(lines.join("\n"), Some(Uuid::new_v4().to_string())),
                )?;
            }
            if paused {
                return Ok(accumulated);
            }

            tokio::time::sleep(self.config.step_delay).await;
        }

        warn!(conversation_id, max_steps, "step limit reached");
        on_event(StreamEvent::StepLimitReached { steps: max_steps });
        Ok(accumulated)
    }

    /// Stream one model response, forwarding deltas to the sink unbuffered.
    async fn stream_step(
        &self,
        conversation_id: &str,
        on_event: &EventSink,
        token: &CancellationToken,
    ) -> AppResult<String> {
        let history = self.store.messages(conversation_id)?;
        let options = {
            let options = self.options.read().unwrap_or_else(|e| e.into_inner());
            options.clone()
        };

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(100);
        let sink = on_event.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // The turn-level Done is emitted by the loop, not per step
                if !matches!(event, StreamEvent::Done { .. }) {
                    sink(event);
                }
            }
        });

        let result = self
            .model
            .stream(
                history,
                self.config.system_prompt.clone(),
                options,
                tx,
                token.child_token(),
            )
            .await;
        let _ = forward.await;

        match result {
            Ok(text) => Ok(text),
            Err(LlmError::Cancelled) => Err(AppError::internal("cancelled")),
            Err(e) => Err(AppError::internal(format!("model stream failed: {e}"))),
        }
    }
}
