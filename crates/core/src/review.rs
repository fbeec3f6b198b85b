//! Review pipeline state for the bootstrap job.
//!
//! Three rounds run strictly in order after every extraction task settled:
//!
//! ```text
//! 1 qualification -> 2 refinement -> 3 dedup + relation discovery
//! ```
//!
//! Each round moves `idle -> running -> completed` (or `failed`), and
//! [`ReviewState::active_round`] never decreases within a session.

use serde::{Deserialize, Serialize};

use crate::progress::percent;

// ---------------------------------------------------------------------------
// Round identity and status
// ---------------------------------------------------------------------------

/// Which of the three review rounds an update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRound {
    Qualification,
    Refinement,
    Dedup,
}

impl ReviewRound {
    /// All rounds in execution order.
    pub const ALL: [ReviewRound; 3] = [Self::Qualification, Self::Refinement, Self::Dedup];

    /// 1-based round number as shown to users and used for `activeRound`.
    pub fn number(self) -> u8 {
        match self {
            Self::Qualification => 1,
            Self::Refinement => 2,
            Self::Dedup => 3,
        }
    }

    /// Inverse of [`number`](Self::number).
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Qualification),
            2 => Some(Self::Refinement),
            3 => Some(Self::Dedup),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Qualification => "qualification",
            Self::Refinement => "refinement",
            Self::Dedup => "dedup",
        }
    }
}

/// Lifecycle of a single round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl RoundStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-round counters
// ---------------------------------------------------------------------------

/// Round 1: which extracted candidates are worth keeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationRound {
    pub status: RoundStatus,
    pub total: u32,
    pub kept: u32,
    pub dropped: u32,
    pub merged: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Round 2: per-candidate refinement, reported item by item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRound {
    pub status: RoundStatus,
    pub total: u32,
    pub current: u32,
    pub progress: u8,
    pub refined: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Round 3: deduplication and relation discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupRound {
    pub status: RoundStatus,
    pub total: u32,
    pub after_dedup: u32,
    pub relations_found: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// ReviewState
// ---------------------------------------------------------------------------

/// Aggregate state of the three review rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// `0` before round 1 starts, otherwise the highest round seen.
    pub active_round: u8,
    pub round1: QualificationRound,
    pub round2: RefinementRound,
    pub round3: DedupRound,
}

impl ReviewState {
    /// Status of the given round.
    pub fn status(&self, round: ReviewRound) -> RoundStatus {
        match round {
            ReviewRound::Qualification => self.round1.status,
            ReviewRound::Refinement => self.round2.status,
            ReviewRound::Dedup => self.round3.status,
        }
    }

    fn status_mut(&mut self, round: ReviewRound) -> &mut RoundStatus {
        match round {
            ReviewRound::Qualification => &mut self.round1.status,
            ReviewRound::Refinement => &mut self.round2.status,
            ReviewRound::Dedup => &mut self.round3.status,
        }
    }

    /// Whether an update for `round` may still be applied.
    ///
    /// Updates for a round older than the active one are stale, and a
    /// terminal round never changes again.
    fn accepts(&self, round: ReviewRound) -> bool {
        round.number() >= self.active_round && !self.status(round).is_terminal()
    }

    fn advance_to(&mut self, round: ReviewRound) {
        self.active_round = self.active_round.max(round.number());
    }

    /// `idle -> running` for `round`. Returns whether anything changed.
    pub fn begin(&mut self, round: ReviewRound, total: u32) -> bool {
        if !self.accepts(round) || self.status(round) == RoundStatus::Running {
            return false;
        }
        self.advance_to(round);
        *self.status_mut(round) = RoundStatus::Running;
        match round {
            ReviewRound::Qualification => self.round1.total = total,
            ReviewRound::Refinement => self.round2.total = total,
            ReviewRound::Dedup => self.round3.total = total,
        }
        true
    }

    /// Per-item progress of round 2. `current` and `progress` only grow.
    pub fn advance_refinement(&mut self, current: u32, total: u32, progress: u8) -> bool {
        if !self.accepts(ReviewRound::Refinement) {
            return false;
        }
        self.advance_to(ReviewRound::Refinement);
        if self.round2.status == RoundStatus::Idle {
            self.round2.status = RoundStatus::Running;
        }
        self.round2.total = total;
        self.round2.current = self.round2.current.max(current);
        self.round2.progress = self.round2.progress.max(progress);
        true
    }

    /// Round 1 `-> completed` with its counters.
    pub fn complete_qualification(
        &mut self,
        total: u32,
        kept: u32,
        dropped: u32,
        merged: u32,
    ) -> bool {
        if !self.accepts(ReviewRound::Qualification) {
            return false;
        }
        self.advance_to(ReviewRound::Qualification);
        self.round1 = QualificationRound {
            status: RoundStatus::Completed,
            total,
            kept,
            dropped,
            merged,
            error: None,
        };
        true
    }

    /// Round 2 `-> completed`; progress jumps to 100.
    pub fn complete_refinement(&mut self, total: u32, refined: u32) -> bool {
        if !self.accepts(ReviewRound::Refinement) {
            return false;
        }
        self.advance_to(ReviewRound::Refinement);
        self.round2 = RefinementRound {
            status: RoundStatus::Completed,
            total,
            current: total,
            progress: 100,
            refined,
            error: None,
        };
        true
    }

    /// Round 3 `-> completed` with its counters.
    pub fn complete_dedup(&mut self, total: u32, after_dedup: u32, relations_found: u32) -> bool {
        if !self.accepts(ReviewRound::Dedup) {
            return false;
        }
        self.advance_to(ReviewRound::Dedup);
        self.round3 = DedupRound {
            status: RoundStatus::Completed,
            total,
            after_dedup,
            relations_found,
            error: None,
        };
        true
    }

    /// `running -> failed` for `round`, recording the cause.
    pub fn fail(&mut self, round: ReviewRound, error: impl Into<String>) -> bool {
        if !self.accepts(round) {
            return false;
        }
        self.advance_to(round);
        let error = Some(error.into());
        match round {
            ReviewRound::Qualification => {
                self.round1.status = RoundStatus::Failed;
                self.round1.error = error;
            }
            ReviewRound::Refinement => {
                self.round2.status = RoundStatus::Failed;
                self.round2.error = error;
            }
            ReviewRound::Dedup => {
                self.round3.status = RoundStatus::Failed;
                self.round3.error = error;
            }
        }
        true
    }

    /// Whether any round ended in failure.
    pub fn has_failed(&self) -> bool {
        ReviewRound::ALL
            .iter()
            .any(|r| self.status(*r) == RoundStatus::Failed)
    }

    /// `(activeRound, status of the active round, round 2 progress)`.
    ///
    /// Every accepted transition keeps this key the same or raises it.
    pub fn stage(&self) -> (u8, u8, u8) {
        let status = ReviewRound::from_number(self.active_round)
            .map_or(0, |round| self.status(round).rank());
        (self.active_round, status, self.round2.progress)
    }

    /// Round 2 progress for item `current` out of `total`.
    pub fn refinement_percent(current: u32, total: u32) -> u8 {
        percent(current, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_start_idle_with_no_active_round() {
        let review = ReviewState::default();
        assert_eq!(review.active_round, 0);
        for round in ReviewRound::ALL {
            assert_eq!(review.status(round), RoundStatus::Idle);
        }
    }

    #[test]
    fn begin_and_complete_advance_active_round() {
        let mut review = ReviewState::default();

        assert!(review.begin(ReviewRound::Qualification, 10));
        assert_eq!(review.active_round, 1);
        assert!(review.complete_qualification(10, 6, 3, 1));

        assert!(review.begin(ReviewRound::Refinement, 6));
        assert_eq!(review.active_round, 2);
        assert_eq!(review.round1.kept, 6);
        assert_eq!(review.round1.status, RoundStatus::Completed);
    }

    #[test]
    fn stale_round_updates_are_ignored() {
        let mut review = ReviewState::default();
        review.begin(ReviewRound::Refinement, 4);

        // A late round-1 event must not pull activeRound back.
        assert!(!review.begin(ReviewRound::Qualification, 10));
        assert!(!review.complete_qualification(10, 4, 6, 0));
        assert_eq!(review.active_round, 2);
        assert_eq!(review.round1.status, RoundStatus::Idle);
    }

    #[test]
    fn completed_round_cannot_restart() {
        let mut review = ReviewState::default();
        review.begin(ReviewRound::Dedup, 3);
        review.complete_dedup(3, 2, 5);

        assert!(!review.begin(ReviewRound::Dedup, 3));
        assert_eq!(review.round3.status, RoundStatus::Completed);
        assert_eq!(review.round3.relations_found, 5);
    }

    #[test]
    fn refinement_progress_never_regresses() {
        let mut review = ReviewState::default();
        review.begin(ReviewRound::Refinement, 4);
        review.advance_refinement(3, 4, 75);
        review.advance_refinement(2, 4, 50);

        assert_eq!(review.round2.current, 3);
        assert_eq!(review.round2.progress, 75);
    }

    #[test]
    fn refinement_progress_without_started_event_runs_the_round() {
        let mut review = ReviewState::default();
        assert!(review.advance_refinement(1, 2, 50));
        assert_eq!(review.round2.status, RoundStatus::Running);
        assert_eq!(review.active_round, 2);
    }

    #[test]
    fn failed_round_is_reported() {
        let mut review = ReviewState::default();
        review.begin(ReviewRound::Qualification, 2);
        assert!(review.fail(ReviewRound::Qualification, "model unavailable"));

        assert!(review.has_failed());
        assert_eq!(review.round1.error.as_deref(), Some("model unavailable"));
        assert!(!review.complete_qualification(2, 2, 0, 0));
    }

    #[test]
    fn stage_rises_through_the_rounds() {
        let mut review = ReviewState::default();
        let mut stages = vec![review.stage()];

        review.begin(ReviewRound::Qualification, 4);
        stages.push(review.stage());
        review.complete_qualification(4, 3, 1, 0);
        stages.push(review.stage());
        review.begin(ReviewRound::Refinement, 3);
        stages.push(review.stage());
        review.advance_refinement(1, 3, 33);
        stages.push(review.stage());
        review.complete_refinement(3, 3);
        stages.push(review.stage());
        review.begin(ReviewRound::Dedup, 3);
        stages.push(review.stage());
        review.fail(ReviewRound::Dedup, "quota");
        stages.push(review.stage());

        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stages.last(), Some(&(3, 2, 100)));
    }

    #[test]
    fn round_numbers_round_trip() {
        for round in ReviewRound::ALL {
            assert_eq!(ReviewRound::from_number(round.number()), Some(round));
        }
        assert_eq!(ReviewRound::from_number(0), None);
        assert_eq!(ReviewRound::from_number(4), None);
    }
}
