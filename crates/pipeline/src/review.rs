//! The three review rounds that follow bootstrap extraction.
//!
//! Rounds run strictly in order. A round whose executor call fails emits
//! `review:round-failed` and the remaining rounds are skipped. An individual
//! round-2 candidate that fails to refine is logged and counted as not
//! refined; the round carries on.

use cookbook_core::progress::percent;
use cookbook_core::protocol::{
    DedupCompleted, JobEvent, QualificationCompleted, RefinementCompleted, RefinementProgress,
    RoundFailed, RoundStarted,
};
use cookbook_core::review::ReviewRound;
use cookbook_core::session::Session;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecutorError, ReviewExecutor};
use crate::store::SessionStore;

/// Review outcome folded into the session summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub kept: u32,
    pub dropped: u32,
    pub merged: u32,
    pub refined: u32,
    pub after_dedup: u32,
    pub relations_found: u32,
    /// Round that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_round: Option<u8>,
    /// Whether the review ran at all.
    pub skipped: bool,
}

impl ReviewReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Drives the rounds for one session.
pub(crate) struct ReviewRun<'a> {
    pub store: &'a SessionStore<Session>,
    pub executor: &'a dyn ReviewExecutor,
    pub session_id: &'a str,
    pub cancel: &'a CancellationToken,
}

impl ReviewRun<'_> {
    /// Run rounds 1 to 3 over `candidates`.
    ///
    /// Returns `None` if the session was replaced mid-review.
    pub async fn run(&self, candidates: Vec<Value>) -> Option<ReviewReport> {
        let mut report = ReviewReport::default();

        // -- Round 1: qualification --
        let total = candidates.len() as u32;
        self.begin(ReviewRound::Qualification, total).await?;
        let qualified = match self.guarded(self.executor.qualify(&candidates)).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(ReviewRound::Qualification, e, report).await,
        };
        report.kept = qualified.kept.len() as u32;
        report.dropped = qualified.dropped;
        report.merged = qualified.merged;
        let (kept, dropped, merged) = (report.kept, report.dropped, report.merged);
        let qualified_total = qualified.total;
        self.apply(move |s| {
            s.review
                .complete_qualification(qualified_total, kept, dropped, merged)
                .then(|| {
                    JobEvent::Round1Completed(QualificationCompleted {
                        total: qualified_total,
                        kept,
                        dropped,
                        merged,
                    })
                })
        })
        .await?;

        // -- Round 2: per-candidate refinement --
        let total = qualified.kept.len() as u32;
        self.begin(ReviewRound::Refinement, total).await?;
        let mut refined_candidates = Vec::with_capacity(qualified.kept.len());
        for (index, candidate) in qualified.kept.iter().enumerate() {
            let current = index as u32 + 1;
            match self.guarded(self.executor.refine_candidate(candidate)).await {
                Ok(outcome) => {
                    if outcome.refined {
                        report.refined += 1;
                    }
                    refined_candidates.push(outcome.candidate);
                }
                Err(ExecutorError::Cancelled) => {
                    return self
                        .fail(ReviewRound::Refinement, ExecutorError::Cancelled, report)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        current,
                        error = %e,
                        "Candidate refinement failed, keeping original",
                    );
                    refined_candidates.push(candidate.clone());
                }
            }
            let progress = percent(current, total);
            self.apply(move |s| {
                s.review
                    .advance_refinement(current, total, progress)
                    .then(|| {
                        JobEvent::Round2Progress(RefinementProgress {
                            current,
                            total,
                            progress,
                        })
                    })
            })
            .await?;
        }
        let refined = report.refined;
        self.apply(move |s| {
            s.review
                .complete_refinement(total, refined)
                .then(|| JobEvent::Round2Completed(RefinementCompleted { total, refined }))
        })
        .await?;

        // -- Round 3: dedup + relation discovery --
        let total = refined_candidates.len() as u32;
        self.begin(ReviewRound::Dedup, total).await?;
        let dedup = match self.guarded(self.executor.deduplicate(&refined_candidates)).await {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(ReviewRound::Dedup, e, report).await,
        };
        report.after_dedup = dedup.after_dedup;
        report.relations_found = dedup.relations_found;
        self.apply(move |s| {
            s.review
                .complete_dedup(total, dedup.after_dedup, dedup.relations_found)
                .then(|| {
                    JobEvent::Round3Completed(DedupCompleted {
                        total,
                        after_dedup: dedup.after_dedup,
                        relations_found: dedup.relations_found,
                    })
                })
        })
        .await?;

        tracing::info!(
            session_id = %self.session_id,
            kept = report.kept,
            refined = report.refined,
            after_dedup = report.after_dedup,
            relations_found = report.relations_found,
            "Review completed",
        );
        Some(report)
    }

    async fn begin(&self, round: ReviewRound, total: u32) -> Option<()> {
        tracing::info!(
            session_id = %self.session_id,
            round = round.number(),
            total,
            "Review round started",
        );
        self.apply(move |s| {
            s.review.begin(round, total).then(|| {
                let payload = RoundStarted { total };
                match round {
                    ReviewRound::Qualification => JobEvent::Round1Started(payload),
                    ReviewRound::Refinement => JobEvent::Round2Started(payload),
                    ReviewRound::Dedup => JobEvent::Round3Started(payload),
                }
            })
        })
        .await
    }

    async fn fail(
        &self,
        round: ReviewRound,
        error: ExecutorError,
        mut report: ReviewReport,
    ) -> Option<ReviewReport> {
        tracing::error!(
            session_id = %self.session_id,
            round = round.number(),
            error = %error,
            "Review round failed, skipping remaining rounds",
        );
        let message = error.to_string();
        self.apply(move |s| {
            s.review.fail(round, message.clone()).then(|| {
                JobEvent::RoundFailed(RoundFailed {
                    round: round.number(),
                    error: message,
                })
            })
        })
        .await?;
        report.failed_round = Some(round.number());
        Some(report)
    }

    async fn apply<F>(&self, apply: F) -> Option<()>
    where
        F: FnOnce(&mut Session) -> Option<JobEvent>,
    {
        self.store.update(self.session_id, apply).await.then_some(())
    }

    /// Race an executor call against cancellation.
    async fn guarded<T, F>(&self, call: F) -> Result<T, ExecutorError>
    where
        F: std::future::Future<Output = Result<T, ExecutorError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExecutorError::Cancelled),
            result = call => result,
        }
    }
}
