//! Local copy of both job sessions, driven by events and snapshots.
//!
//! Each event applies its field-level transition directly. Snapshots pulled
//! after a (re)connect go through [`should_accept_snapshot`] so they can
//! only move state forward. Completion is announced through the
//! [`Notifier`] exactly once per session id, whichever of the terminal
//! event or a terminal snapshot arrives first.

use std::sync::Arc;

use cookbook_core::progress::{elapsed_since, JobSession};
use cookbook_core::protocol::{JobEvent, JobKind};
use cookbook_core::refine::{RefineCandidate, RefineSession};
use cookbook_core::review::ReviewRound;
use cookbook_core::session::{Session, SessionStatus};
use cookbook_core::types::{now_millis, SessionId};

use crate::merge::should_accept_snapshot;
use crate::notify::{Notification, Notifier};

// ---------------------------------------------------------------------------
// Per-kind view
// ---------------------------------------------------------------------------

/// What a snapshot merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The snapshot replaced the local session.
    Accepted,
    /// The local session is further along; the snapshot was dropped.
    Discarded,
    /// The server reported idle and nothing changed locally.
    Idle,
}

/// The observer's copy of one job kind plus its notification latch.
#[derive(Debug)]
struct JobView<S> {
    session: Option<S>,
    /// Session id the completion notification already fired for.
    notified: Option<SessionId>,
}

impl<S> Default for JobView<S> {
    fn default() -> Self {
        Self {
            session: None,
            notified: None,
        }
    }
}

impl<S: JobSession> JobView<S> {
    fn is_current(&self, session_id: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.session_id() == session_id)
    }

    /// Install a freshly started session unless it is already held.
    fn start(&mut self, session_id: &str, build: impl FnOnce() -> S) -> bool {
        if self.is_current(session_id) {
            return false;
        }
        self.replace(build());
        true
    }

    fn replace(&mut self, session: S) {
        if self.notified.as_deref() != Some(session.session_id()) {
            self.notified = None;
        }
        self.session = Some(session);
    }

    fn merge(&mut self, snapshot: Option<S>) -> MergeOutcome {
        let Some(snapshot) = snapshot else {
            return MergeOutcome::Idle;
        };
        if should_accept_snapshot(self.session.as_ref(), &snapshot) {
            self.replace(snapshot);
            MergeOutcome::Accepted
        } else {
            MergeOutcome::Discarded
        }
    }

    /// Arm the latch if the held session is terminal and not yet announced.
    fn take_completion(&mut self) -> Option<&S> {
        let session = self.session.as_ref()?;
        if !session.is_terminal() || self.notified.as_deref() == Some(session.session_id()) {
            return None;
        }
        self.notified = Some(session.session_id().to_string());
        Some(session)
    }

    fn reset(&mut self) {
        self.session = None;
        self.notified = None;
    }
}

// ---------------------------------------------------------------------------
// Progress report
// ---------------------------------------------------------------------------

/// Display values for one job kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub kind: JobKind,
    pub session_id: SessionId,
    pub progress: u8,
    pub settled: u32,
    pub total: u32,
    /// Estimate from the server-reported elapsed time.
    pub eta_ms: Option<u64>,
    /// Cosmetic wall-clock time since the session started.
    pub elapsed_so_far_ms: u64,
    pub running: bool,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Observer-side state for both job kinds.
pub struct Reconciler {
    bootstrap: JobView<Session>,
    refine: JobView<RefineSession>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            bootstrap: JobView::default(),
            refine: JobView::default(),
            notifier,
        }
    }

    pub fn bootstrap(&self) -> Option<&Session> {
        self.bootstrap.session.as_ref()
    }

    pub fn refine(&self) -> Option<&RefineSession> {
        self.refine.session.as_ref()
    }

    /// Forget the local session of `kind` and clear its latch.
    pub fn reset(&mut self, kind: JobKind) {
        match kind {
            JobKind::Bootstrap => self.bootstrap.reset(),
            JobKind::Refine => self.refine.reset(),
        }
    }

    /// Apply one event. Returns whether local state changed.
    ///
    /// Events for a session other than the local one are discarded, as are
    /// per-task events received before any `started`.
    pub fn apply_event(&mut self, event: JobEvent) -> bool {
        let now = now_millis();
        match event {
            // -- bootstrap --
            JobEvent::BootstrapStarted(e) => self.bootstrap.start(&e.session_id, || {
                Session::new(e.session_id.clone(), &e.tasks, e.started_at)
            }),
            JobEvent::TaskStarted(e) => self.with_bootstrap(|s| {
                let changed = s.start_task(&e.task_id, now);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::TaskCompleted(e) => self.with_bootstrap(|s| {
                let changed = s.complete_task(&e.task_id, e.result, now);
                if changed {
                    if let Some(tool_calls) = e.tool_calls {
                        s.add_tool_calls(tool_calls);
                    }
                }
                s.record_elapsed(e.elapsed_ms);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::TaskFailed(e) => self.with_bootstrap(|s| {
                let changed = s.fail_task(&e.task_id, e.error, now);
                s.record_elapsed(e.elapsed_ms);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::AllCompleted(e) => {
                if !self.bootstrap.is_current(&e.session_id) {
                    tracing::debug!(
                        session_id = %e.session_id,
                        "Ignoring completion of another session",
                    );
                    return false;
                }
                let changed = self.with_bootstrap(|s| {
                    let was_terminal = s.status.is_terminal();
                    s.finish(e.summary, now);
                    !was_terminal
                });
                self.notify_bootstrap();
                changed
            }

            // -- review --
            JobEvent::Round1Started(e) => {
                self.with_bootstrap(|s| s.review.begin(ReviewRound::Qualification, e.total))
            }
            JobEvent::Round1Completed(e) => self.with_bootstrap(|s| {
                s.review
                    .complete_qualification(e.total, e.kept, e.dropped, e.merged)
            }),
            JobEvent::Round2Started(e) => {
                self.with_bootstrap(|s| s.review.begin(ReviewRound::Refinement, e.total))
            }
            JobEvent::Round2Progress(e) => self.with_bootstrap(|s| {
                s.review.advance_refinement(e.current, e.total, e.progress)
            }),
            JobEvent::Round2Completed(e) => {
                self.with_bootstrap(|s| s.review.complete_refinement(e.total, e.refined))
            }
            JobEvent::Round3Started(e) => {
                self.with_bootstrap(|s| s.review.begin(ReviewRound::Dedup, e.total))
            }
            JobEvent::Round3Completed(e) => self.with_bootstrap(|s| {
                s.review
                    .complete_dedup(e.total, e.after_dedup, e.relations_found)
            }),
            JobEvent::RoundFailed(e) => {
                let Some(round) = ReviewRound::from_number(e.round) else {
                    tracing::warn!(round = e.round, "Ignoring failure of unknown review round");
                    return false;
                };
                self.with_bootstrap(|s| s.review.fail(round, e.error))
            }

            // -- refine --
            JobEvent::RefineStarted(e) => self.refine.start(&e.session_id, || {
                let candidates: Vec<RefineCandidate> = e
                    .candidate_ids
                    .iter()
                    .map(|id| RefineCandidate::new(id.clone(), String::new()))
                    .collect();
                RefineSession::new(e.session_id.clone(), &candidates, e.started_at)
            }),
            JobEvent::ItemStarted(e) => self.with_refine(|s| {
                fill_title(s, &e.candidate_id, &e.title);
                let changed = s.start_item(&e.candidate_id, e.current);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::ItemCompleted(e) => self.with_refine(|s| {
                fill_title(s, &e.candidate_id, &e.title);
                let changed = s.complete_item(&e.candidate_id, e.refined, e.current);
                s.refined = s.refined.max(e.refined_so_far);
                s.record_elapsed(e.elapsed_ms);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::ItemFailed(e) => self.with_refine(|s| {
                fill_title(s, &e.candidate_id, &e.title);
                let changed = s.fail_item(&e.candidate_id, e.error, e.current);
                s.record_elapsed(e.elapsed_ms);
                lift(&mut s.progress, e.progress) || changed
            }),
            JobEvent::RefineCompleted(e) => {
                if !self.refine.is_current(&e.session_id) {
                    tracing::debug!(
                        session_id = %e.session_id,
                        "Ignoring completion of another refine run",
                    );
                    return false;
                }
                let changed = self.with_refine(|s| {
                    let was_terminal = s.is_terminal();
                    s.finish(Some(e.refined), Some(e.failed));
                    !was_terminal
                });
                self.notify_refine();
                changed
            }
        }
    }

    /// Merge a bootstrap snapshot (`None` when the server is idle).
    pub fn merge_bootstrap_snapshot(&mut self, snapshot: Option<Session>) -> MergeOutcome {
        let outcome = self.bootstrap.merge(snapshot);
        if outcome == MergeOutcome::Accepted {
            self.notify_bootstrap();
        }
        outcome
    }

    /// Merge a refine snapshot (`None` when the server is idle).
    pub fn merge_refine_snapshot(&mut self, snapshot: Option<RefineSession>) -> MergeOutcome {
        let outcome = self.refine.merge(snapshot);
        if outcome == MergeOutcome::Accepted {
            self.notify_refine();
        }
        outcome
    }

    /// Display values for `kind`, if a session is held.
    pub fn report(&self, kind: JobKind) -> Option<ProgressReport> {
        let now = now_millis();
        match kind {
            JobKind::Bootstrap => self.bootstrap().map(|s| ProgressReport {
                kind,
                session_id: s.id.clone(),
                progress: s.progress,
                settled: s.settled(),
                total: s.total,
                eta_ms: s.estimated_remaining_ms(),
                elapsed_so_far_ms: elapsed_since(s.started_at, now),
                running: s.is_running(),
            }),
            JobKind::Refine => self.refine().map(|s| ProgressReport {
                kind,
                session_id: s.id.clone(),
                progress: s.progress,
                settled: s.settled(),
                total: s.total,
                eta_ms: s.estimated_remaining_ms(),
                elapsed_so_far_ms: elapsed_since(s.started_at, now),
                running: s.is_running(),
            }),
        }
    }

    fn with_bootstrap(&mut self, apply: impl FnOnce(&mut Session) -> bool) -> bool {
        match self.bootstrap.session.as_mut() {
            Some(session) => apply(session),
            None => {
                tracing::debug!("Bootstrap event before any session, ignoring");
                false
            }
        }
    }

    fn with_refine(&mut self, apply: impl FnOnce(&mut RefineSession) -> bool) -> bool {
        match self.refine.session.as_mut() {
            Some(session) => apply(session),
            None => {
                tracing::debug!("Refine event before any run, ignoring");
                false
            }
        }
    }

    fn notify_bootstrap(&mut self) {
        let Some(s) = self.bootstrap.take_completion() else {
            return;
        };
        let notification = Notification {
            kind: JobKind::Bootstrap,
            session_id: s.id.clone(),
            total: s.total,
            succeeded: s.completed,
            failed: s.failed,
            with_errors: s.status == SessionStatus::CompletedWithErrors,
        };
        self.notifier.notify(&notification);
    }

    fn notify_refine(&mut self) {
        let Some(s) = self.refine.take_completion() else {
            return;
        };
        let notification = Notification {
            kind: JobKind::Refine,
            session_id: s.id.clone(),
            total: s.total,
            succeeded: s.refined,
            failed: s.failed,
            with_errors: s.failed > 0,
        };
        self.notifier.notify(&notification);
    }
}

/// Raise `progress` to `reported`; it never decreases. Returns whether it
/// moved.
fn lift(progress: &mut u8, reported: u8) -> bool {
    let reported = reported.min(100);
    if reported > *progress {
        *progress = reported;
        true
    } else {
        false
    }
}

/// Item titles only travel on per-item events.
fn fill_title(session: &mut RefineSession, candidate_id: &str, title: &str) {
    if let Some(item) = session
        .items
        .iter_mut()
        .find(|i| i.candidate_id == candidate_id && i.title.is_empty())
    {
        item.title = title.to_string();
    }
}
