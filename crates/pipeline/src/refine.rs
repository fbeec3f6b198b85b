//! Refine job coordinator.
//!
//! Candidates are refined one at a time in submission order. Each item emits
//! `refine:item-started` followed by exactly one of `item-completed` or
//! `item-failed`; `refine:completed` closes the run.

use std::sync::Arc;

use cookbook_core::error::CoreError;
use cookbook_core::protocol::{
    ItemCompleted, ItemFailed, ItemStarted, JobEvent, RefineCompleted, RefineStarted,
};
use cookbook_core::refine::{
    item_settled_percent, item_started_percent, validate_candidates, RefineCandidate,
    RefineSession,
};
use cookbook_core::types::{new_session_id, now_millis, SessionId};
use cookbook_events::EventBus;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::executor::{ExecutorError, RefineExecutor};
use crate::store::SessionStore;

/// Coordinator for the refine job. Cheap to clone.
#[derive(Clone)]
pub struct RefineCoordinator {
    store: Arc<SessionStore<RefineSession>>,
    executor: Arc<dyn RefineExecutor>,
    config: PipelineConfig,
}

impl RefineCoordinator {
    pub fn new(
        bus: Arc<EventBus>,
        executor: Arc<dyn RefineExecutor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new(bus)),
            executor,
            config,
        }
    }

    /// Start a refine run in the background and return its id.
    pub async fn start_session(
        &self,
        candidates: Vec<RefineCandidate>,
    ) -> Result<SessionId, CoreError> {
        let (session_id, cancel) = self.install(&candidates).await?;
        let this = self.clone();
        let id = session_id.clone();
        tokio::spawn(async move {
            this.run(&id, candidates, cancel).await;
        });
        Ok(session_id)
    }

    /// Start a refine run and drive it to completion on this task.
    pub async fn run_session(
        &self,
        candidates: Vec<RefineCandidate>,
    ) -> Result<Option<RefineSession>, CoreError> {
        let (session_id, cancel) = self.install(&candidates).await?;
        self.run(&session_id, candidates, cancel).await;
        Ok(self
            .store
            .snapshot()
            .await
            .filter(|s| s.id == session_id))
    }

    pub async fn get_status(&self) -> Option<RefineSession> {
        self.store.snapshot().await
    }

    pub async fn is_running(&self) -> bool {
        self.store.is_running().await
    }

    pub async fn cancel(&self) -> Result<SessionId, CoreError> {
        let session_id = self.store.cancel_running().await?;
        tracing::info!(%session_id, "Refine cancellation requested");
        Ok(session_id)
    }

    pub async fn reset(&self) -> Result<(), CoreError> {
        self.store.reset().await
    }

    pub async fn shutdown(&self) {
        self.store.cancel_all().await;
    }

    async fn install(
        &self,
        candidates: &[RefineCandidate],
    ) -> Result<(SessionId, CancellationToken), CoreError> {
        validate_candidates(candidates)?;

        let session_id = new_session_id();
        let started_at = now_millis();
        let session = RefineSession::new(session_id.clone(), candidates, started_at);
        let started = JobEvent::RefineStarted(RefineStarted {
            session_id: session_id.clone(),
            total: session.total,
            candidate_ids: session.candidate_ids(),
            started_at,
        });
        let cancel = self.store.begin(session, started).await;

        tracing::info!(%session_id, total = candidates.len(), "Refine session started");
        Ok((session_id, cancel))
    }

    async fn run(
        &self,
        session_id: &str,
        candidates: Vec<RefineCandidate>,
        cancel: CancellationToken,
    ) {
        let clock = Instant::now();
        let total = candidates.len() as u32;

        for (index, candidate) in candidates.iter().enumerate() {
            let current = index as u32 + 1;

            let outcome = if cancel.is_cancelled() {
                Err(ExecutorError::Cancelled)
            } else {
                let accepted = self
                    .store
                    .update(session_id, |s| {
                        s.start_item(&candidate.candidate_id, current).then(|| {
                            JobEvent::ItemStarted(ItemStarted {
                                candidate_id: candidate.candidate_id.clone(),
                                title: candidate.title.clone(),
                                current,
                                total,
                                progress: item_started_percent(current, total),
                            })
                        })
                    })
                    .await;
                if !accepted {
                    tracing::info!(%session_id, "Refine session replaced, stopping");
                    return;
                }

                let timeout = self.config.task_timeout;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
                    result = tokio::time::timeout(timeout, self.executor.refine(candidate)) => {
                        result.unwrap_or(Err(ExecutorError::Timeout(timeout)))
                    }
                }
            };

            let elapsed_ms = clock.elapsed().as_millis() as u64;
            let accepted = match outcome {
                Ok(refined) => {
                    self.store
                        .update(session_id, |s| {
                            s.record_elapsed(elapsed_ms);
                            s.complete_item(&candidate.candidate_id, refined, current)
                                .then(|| {
                                    JobEvent::ItemCompleted(ItemCompleted {
                                        candidate_id: candidate.candidate_id.clone(),
                                        title: candidate.title.clone(),
                                        refined,
                                        current,
                                        total,
                                        progress: item_settled_percent(current, total),
                                        refined_so_far: s.refined,
                                        elapsed_ms: s.elapsed_ms,
                                    })
                                })
                        })
                        .await
                }
                Err(error) => {
                    if !matches!(error, ExecutorError::Cancelled) {
                        tracing::warn!(
                            %session_id,
                            candidate_id = %candidate.candidate_id,
                            error = %error,
                            "Refine item failed",
                        );
                    }
                    let message = error.to_string();
                    self.store
                        .update(session_id, |s| {
                            s.record_elapsed(elapsed_ms);
                            s.fail_item(&candidate.candidate_id, message.clone(), current)
                                .then(|| {
                                    JobEvent::ItemFailed(ItemFailed {
                                        candidate_id: candidate.candidate_id.clone(),
                                        title: candidate.title.clone(),
                                        error: message,
                                        current,
                                        total,
                                        progress: item_settled_percent(current, total),
                                        elapsed_ms: s.elapsed_ms,
                                    })
                                })
                        })
                        .await
                }
            };
            if !accepted {
                tracing::info!(%session_id, "Refine session replaced, stopping");
                return;
            }
        }

        self.store
            .update(session_id, |s| {
                s.finish(None, None);
                tracing::info!(
                    %session_id,
                    refined = s.refined,
                    failed = s.failed,
                    cancelled = cancel.is_cancelled(),
                    "Refine session finished",
                );
                Some(JobEvent::RefineCompleted(RefineCompleted {
                    session_id: session_id.to_string(),
                    total: s.total,
                    refined: s.refined,
                    failed: s.failed,
                }))
            })
            .await;
    }
}
