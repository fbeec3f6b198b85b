//! Refine job model: a single-level, sequential pass over candidates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{estimate_remaining_ms, percent, JobSession};
use crate::types::{EpochMillis, SessionId};

/// Upper bound on candidates accepted for a single refine run.
pub const MAX_REFINE_CANDIDATES: usize = 1_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStatus {
    #[default]
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineItemStatus {
    #[default]
    Pending,
    Refining,
    Done,
    Failed,
}

impl RefineItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// A candidate as submitted to `refine/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineCandidate {
    pub candidate_id: String,
    pub title: String,
}

impl RefineCandidate {
    pub fn new(candidate_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineItem {
    pub candidate_id: String,
    pub title: String,
    pub status: RefineItemStatus,
    /// Whether the refiner changed the candidate. Set once the item is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One run of the refine job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineSession {
    pub id: SessionId,
    pub status: RefineStatus,
    pub total: u32,
    /// 1-based index of the item most recently started.
    pub current: u32,
    pub progress: u8,
    pub refined: u32,
    pub failed: u32,
    pub items: Vec<RefineItem>,
    pub started_at: EpochMillis,
    pub elapsed_ms: u64,
}

pub fn validate_candidates(candidates: &[RefineCandidate]) -> Result<(), CoreError> {
    if candidates.is_empty() {
        return Err(CoreError::Validation(
            "A refine run needs at least one candidate".to_string(),
        ));
    }
    if candidates.len() > MAX_REFINE_CANDIDATES {
        return Err(CoreError::Validation(format!(
            "A refine run accepts at most {MAX_REFINE_CANDIDATES} candidates, got {}",
            candidates.len()
        )));
    }
    let mut seen = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.candidate_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "Candidate id must not be empty".to_string(),
            ));
        }
        if !seen.insert(candidate.candidate_id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate candidate id '{}'",
                candidate.candidate_id
            )));
        }
    }
    Ok(())
}

/// Progress when item `current` (1-based) starts.
pub fn item_started_percent(current: u32, total: u32) -> u8 {
    percent(current.saturating_sub(1), total)
}

/// Progress when item `current` (1-based) settles.
pub fn item_settled_percent(current: u32, total: u32) -> u8 {
    percent(current, total)
}

impl RefineSession {
    pub fn new(id: SessionId, candidates: &[RefineCandidate], started_at: EpochMillis) -> Self {
        let items: Vec<RefineItem> = candidates
            .iter()
            .map(|c| RefineItem {
                candidate_id: c.candidate_id.clone(),
                title: c.title.clone(),
                status: RefineItemStatus::Pending,
                refined: None,
                error: None,
            })
            .collect();
        Self {
            id,
            status: RefineStatus::Running,
            total: items.len() as u32,
            current: 0,
            progress: 0,
            refined: 0,
            failed: 0,
            items,
            started_at,
            elapsed_ms: 0,
        }
    }

    pub fn item(&self, candidate_id: &str) -> Option<&RefineItem> {
        self.items.iter().find(|i| i.candidate_id == candidate_id)
    }

    fn item_mut(&mut self, candidate_id: &str) -> Option<&mut RefineItem> {
        self.items.iter_mut().find(|i| i.candidate_id == candidate_id)
    }

    pub fn candidate_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.candidate_id.clone()).collect()
    }

    /// Items that reached `done` or `failed`.
    pub fn settled(&self) -> u32 {
        self.items.iter().filter(|i| i.status.is_terminal()).count() as u32
    }

    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let settled = self.settled();
        estimate_remaining_ms(self.elapsed_ms, settled, self.total.saturating_sub(settled))
    }

    pub fn raise_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    pub fn record_elapsed(&mut self, elapsed_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.max(elapsed_ms);
    }

    /// `pending -> refining` for item `current` (1-based).
    pub fn start_item(&mut self, candidate_id: &str, current: u32) -> bool {
        let Some(item) = self.item_mut(candidate_id) else {
            return false;
        };
        if item.status != RefineItemStatus::Pending {
            return false;
        }
        item.status = RefineItemStatus::Refining;
        self.current = self.current.max(current);
        let total = self.total;
        self.raise_progress(item_started_percent(current, total));
        true
    }

    /// `pending|refining -> done`.
    pub fn complete_item(&mut self, candidate_id: &str, refined: bool, current: u32) -> bool {
        let Some(item) = self.item_mut(candidate_id) else {
            return false;
        };
        if item.status.is_terminal() {
            return false;
        }
        item.status = RefineItemStatus::Done;
        item.refined = Some(refined);
        if refined {
            self.refined += 1;
        }
        self.current = self.current.max(current);
        let total = self.total;
        self.raise_progress(item_settled_percent(current, total));
        true
    }

    /// `pending|refining -> failed`.
    pub fn fail_item(
        &mut self,
        candidate_id: &str,
        error: impl Into<String>,
        current: u32,
    ) -> bool {
        let Some(item) = self.item_mut(candidate_id) else {
            return false;
        };
        if item.status.is_terminal() {
            return false;
        }
        item.status = RefineItemStatus::Failed;
        item.error = Some(error.into());
        self.failed += 1;
        self.current = self.current.max(current);
        let total = self.total;
        self.raise_progress(item_settled_percent(current, total));
        true
    }

    /// Settle leftover items as `done` and enter `completed`. Idempotent.
    ///
    /// `refined` and `failed` are the authoritative totals from the terminal
    /// event when the caller has them.
    pub fn finish(&mut self, refined: Option<u32>, failed: Option<u32>) {
        for item in &mut self.items {
            if !item.status.is_terminal() {
                item.status = RefineItemStatus::Done;
            }
        }
        if let Some(refined) = refined {
            self.refined = self.refined.max(refined);
        }
        if let Some(failed) = failed {
            self.failed = self.failed.max(failed);
        }
        self.current = self.total;
        self.raise_progress(100);
        self.status = RefineStatus::Completed;
    }
}

impl JobSession for RefineSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn progress(&self) -> u8 {
        self.progress
    }

    fn touched(&self) -> u32 {
        self.items
            .iter()
            .filter(|i| i.status != RefineItemStatus::Pending)
            .count() as u32
    }

    fn is_running(&self) -> bool {
        self.status == RefineStatus::Running
    }

    fn is_terminal(&self) -> bool {
        self.status == RefineStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<RefineCandidate> {
        vec![
            RefineCandidate::new("c1", "Retry with backoff"),
            RefineCandidate::new("c2", "Typed config loader"),
            RefineCandidate::new("c3", "Graceful shutdown"),
            RefineCandidate::new("c4", "Request id propagation"),
        ]
    }

    #[test]
    fn validation_rejects_empty_and_duplicates() {
        assert!(validate_candidates(&[]).is_err());
        let mut dup = candidates();
        dup.push(RefineCandidate::new("c2", "Dup"));
        assert!(validate_candidates(&dup).is_err());
        assert!(validate_candidates(&candidates()).is_ok());
    }

    #[test]
    fn item_progress_uses_one_based_index() {
        assert_eq!(item_started_percent(1, 4), 0);
        assert_eq!(item_settled_percent(1, 4), 25);
        assert_eq!(item_started_percent(4, 4), 75);
        assert_eq!(item_settled_percent(4, 4), 100);
    }

    #[test]
    fn sequential_run_tracks_counts() {
        let mut s = RefineSession::new("r-1".into(), &candidates(), 0);

        assert!(s.start_item("c1", 1));
        assert!(s.complete_item("c1", true, 1));
        assert!(s.start_item("c2", 2));
        assert!(s.fail_item("c2", "timeout", 2));
        assert!(s.start_item("c3", 3));
        assert!(s.complete_item("c3", false, 3));

        assert_eq!(s.refined, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.current, 3);
        assert_eq!(s.progress, 75);
        assert_eq!(s.touched(), 3);
    }

    #[test]
    fn settled_item_is_immutable() {
        let mut s = RefineSession::new("r-1".into(), &candidates(), 0);
        s.complete_item("c1", true, 1);
        assert!(!s.fail_item("c1", "late", 1));
        assert!(!s.start_item("c1", 1));
        assert_eq!(s.refined, 1);
        assert_eq!(s.failed, 0);
    }

    #[test]
    fn finish_settles_leftovers() {
        let mut s = RefineSession::new("r-1".into(), &candidates(), 0);
        s.start_item("c1", 1);
        s.finish(Some(2), Some(0));

        assert_eq!(s.status, RefineStatus::Completed);
        assert!(s.items.iter().all(|i| i.status.is_terminal()));
        assert_eq!(s.refined, 2);
        assert_eq!(s.progress, 100);
        assert_eq!(s.current, 4);
    }

    #[test]
    fn serializes_camel_case() {
        let s = RefineSession::new("r-1".into(), &candidates()[..1], 5);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["items"][0]["candidateId"], "c1");
        assert_eq!(json["items"][0]["status"], "pending");
        assert_eq!(json["startedAt"], 5);
    }
}
