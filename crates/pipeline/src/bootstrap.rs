//! Bootstrap job coordinator.
//!
//! One session per process. [`BootstrapCoordinator::start_session`]
//! validates the task list, installs the session, publishes
//! `bootstrap:started` and spawns the runner. The runner:
//!
//! 1. Executes tasks through a worker pool of `max_concurrency` slots, each
//!    wrapped in `task_timeout`. A task failure is counted and never aborts
//!    the session.
//! 2. Runs the review rounds over the successful results (skipped when the
//!    session was cancelled or nothing succeeded).
//! 3. Force-closes any open task, settles the terminal status and publishes
//!    `bootstrap:all-completed`.

use std::sync::Arc;

use cookbook_core::error::CoreError;
use cookbook_core::protocol::{
    AllCompleted, BootstrapStarted, JobEvent, TaskCompleted, TaskFailed, TaskStarted,
};
use cookbook_core::session::{validate_descriptors, Session, TaskDescriptor};
use cookbook_core::types::{new_session_id, now_millis, SessionId};
use cookbook_events::EventBus;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::executor::{ExecutorError, ReviewExecutor, TaskExecutor};
use crate::review::{ReviewReport, ReviewRun};
use crate::store::SessionStore;

/// Coordinator for the bootstrap job. Cheap to clone.
#[derive(Clone)]
pub struct BootstrapCoordinator {
    store: Arc<SessionStore<Session>>,
    tasks: Arc<dyn TaskExecutor>,
    review: Arc<dyn ReviewExecutor>,
    config: PipelineConfig,
}

impl BootstrapCoordinator {
    pub fn new(
        bus: Arc<EventBus>,
        tasks: Arc<dyn TaskExecutor>,
        review: Arc<dyn ReviewExecutor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new(bus)),
            tasks,
            review,
            config,
        }
    }

    /// Start a session in the background and return its id.
    ///
    /// Validation failures are returned synchronously and emit nothing.
    pub async fn start_session(
        &self,
        descriptors: Vec<TaskDescriptor>,
    ) -> Result<SessionId, CoreError> {
        let (session_id, cancel) = self.install(&descriptors).await?;
        let this = self.clone();
        let id = session_id.clone();
        tokio::spawn(async move {
            this.run(&id, descriptors, cancel).await;
        });
        Ok(session_id)
    }

    /// Start a session and drive it to its terminal state on this task.
    ///
    /// Returns the final snapshot, or `None` if the session was replaced
    /// before it finished.
    pub async fn run_session(
        &self,
        descriptors: Vec<TaskDescriptor>,
    ) -> Result<Option<Session>, CoreError> {
        let (session_id, cancel) = self.install(&descriptors).await?;
        self.run(&session_id, descriptors, cancel).await;
        Ok(self
            .store
            .snapshot()
            .await
            .filter(|s| s.id == session_id))
    }

    /// Current session snapshot, `None` when idle.
    pub async fn get_status(&self) -> Option<Session> {
        self.store.snapshot().await
    }

    pub async fn is_running(&self) -> bool {
        self.store.is_running().await
    }

    /// Cancel the running session; see [`SessionStore::cancel_running`].
    pub async fn cancel(&self) -> Result<SessionId, CoreError> {
        let session_id = self.store.cancel_running().await?;
        tracing::info!(%session_id, "Bootstrap cancellation requested");
        Ok(session_id)
    }

    /// Drop a finished session; see [`SessionStore::reset`].
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.store.reset().await
    }

    /// Cancel any running session. Used during shutdown.
    pub async fn shutdown(&self) {
        self.store.cancel_all().await;
    }

    // -----------------------------------------------------------------------
    // Runner
    // -----------------------------------------------------------------------

    async fn install(
        &self,
        descriptors: &[TaskDescriptor],
    ) -> Result<(SessionId, CancellationToken), CoreError> {
        validate_descriptors(descriptors)?;

        let session_id = new_session_id();
        let started_at = now_millis();
        let session = Session::new(session_id.clone(), descriptors, started_at);
        let started = JobEvent::BootstrapStarted(BootstrapStarted {
            session_id: session_id.clone(),
            total: session.total,
            tasks: descriptors.to_vec(),
            started_at,
        });
        let cancel = self.store.begin(session, started).await;

        tracing::info!(
            %session_id,
            total = descriptors.len(),
            max_concurrency = self.config.max_concurrency,
            "Bootstrap session started",
        );
        Ok((session_id, cancel))
    }

    async fn run(
        &self,
        session_id: &str,
        descriptors: Vec<TaskDescriptor>,
        cancel: CancellationToken,
    ) {
        let clock = Instant::now();

        let indexed = descriptors.into_iter().enumerate();
        let outcomes: Vec<Option<(usize, Value)>> = stream::iter(indexed)
            .map(|(index, descriptor)| {
                let cancel = &cancel;
                async move {
                    self.run_task(session_id, &descriptor, cancel, clock)
                        .await
                        .map(|result| (index, result))
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        let mut results: Vec<(usize, Value)> = outcomes.into_iter().flatten().collect();
        results.sort_by_key(|(index, _)| *index);
        let candidates: Vec<Value> = results.into_iter().map(|(_, result)| result).collect();

        let cancelled = cancel.is_cancelled();
        let report = if cancelled {
            tracing::info!(%session_id, "Session cancelled, skipping review");
            ReviewReport::skipped()
        } else if candidates.is_empty() {
            tracing::warn!(%session_id, "No task succeeded, skipping review");
            ReviewReport::skipped()
        } else {
            let review = ReviewRun {
                store: &self.store,
                executor: self.review.as_ref(),
                session_id,
                cancel: &cancel,
            };
            match review.run(candidates).await {
                Some(report) => report,
                None => return,
            }
        };

        let cancelled = cancel.is_cancelled();
        let finished = self
            .store
            .update(session_id, |s| {
                let closed = s.close_open_tasks(now_millis());
                if closed > 0 {
                    tracing::warn!(%session_id, closed, "Force-closed open tasks");
                }
                let summary = build_summary(s, &report, cancelled);
                s.finish(Some(summary.clone()), now_millis());
                tracing::info!(
                    %session_id,
                    status = ?s.status,
                    completed = s.completed,
                    failed = s.failed,
                    elapsed_ms = clock.elapsed().as_millis() as u64,
                    "Bootstrap session finished",
                );
                Some(JobEvent::AllCompleted(AllCompleted {
                    session_id: session_id.to_string(),
                    summary: Some(summary),
                }))
            })
            .await;
        if !finished {
            tracing::info!(%session_id, "Session replaced before completion");
        }
    }

    /// Execute one task. Returns its result when it completed.
    async fn run_task(
        &self,
        session_id: &str,
        descriptor: &TaskDescriptor,
        cancel: &CancellationToken,
        clock: Instant,
    ) -> Option<Value> {
        let task_id = descriptor.id.as_str();

        if cancel.is_cancelled() {
            self.settle_failed(session_id, task_id, &ExecutorError::Cancelled, clock)
                .await;
            return None;
        }

        let current = self
            .store
            .update(session_id, |s| {
                s.start_task(task_id, now_millis()).then(|| {
                    JobEvent::TaskStarted(TaskStarted {
                        task_id: task_id.to_string(),
                        progress: s.progress,
                    })
                })
            })
            .await;
        if !current {
            return None;
        }
        tracing::debug!(%session_id, %task_id, kind = %descriptor.meta.kind, "Task started");

        let timeout = self.config.task_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
            result = tokio::time::timeout(timeout, self.tasks.execute(descriptor)) => {
                result.unwrap_or(Err(ExecutorError::Timeout(timeout)))
            }
        };

        match outcome {
            Ok(output) => {
                let elapsed_ms = clock.elapsed().as_millis() as u64;
                let result = output.result;
                let tool_calls = output.tool_calls;
                let event_result = result.clone();
                self.store
                    .update(session_id, |s| {
                        s.record_elapsed(elapsed_ms);
                        if !s.complete_task(task_id, Some(event_result.clone()), now_millis()) {
                            return None;
                        }
                        s.add_tool_calls(tool_calls);
                        Some(JobEvent::TaskCompleted(TaskCompleted {
                            task_id: task_id.to_string(),
                            result: Some(event_result),
                            progress: s.progress,
                            completed: s.completed,
                            total: s.total,
                            elapsed_ms: s.elapsed_ms,
                            tool_calls: Some(tool_calls),
                        }))
                    })
                    .await;
                tracing::debug!(%session_id, %task_id, elapsed_ms, tool_calls, "Task completed");
                Some(result)
            }
            Err(error) => {
                self.settle_failed(session_id, task_id, &error, clock).await;
                None
            }
        }
    }

    async fn settle_failed(
        &self,
        session_id: &str,
        task_id: &str,
        error: &ExecutorError,
        clock: Instant,
    ) {
        let elapsed_ms = clock.elapsed().as_millis() as u64;
        let message = error.to_string();
        if !matches!(error, ExecutorError::Cancelled) {
            tracing::warn!(%session_id, %task_id, error = %message, "Task failed");
        }
        self.store
            .update(session_id, |s| {
                s.record_elapsed(elapsed_ms);
                s.fail_task(task_id, message.clone(), now_millis()).then(|| {
                    JobEvent::TaskFailed(TaskFailed {
                        task_id: task_id.to_string(),
                        error: message,
                        progress: s.progress,
                        elapsed_ms: s.elapsed_ms,
                    })
                })
            })
            .await;
    }
}

/// Summary attached to the terminal session and `all-completed`.
fn build_summary(session: &Session, review: &ReviewReport, cancelled: bool) -> Value {
    json!({
        "total": session.total,
        "completed": session.completed,
        "failed": session.failed,
        "cancelled": cancelled,
        "totalToolCalls": session.total_tool_calls.unwrap_or(0),
        "review": review,
    })
}
