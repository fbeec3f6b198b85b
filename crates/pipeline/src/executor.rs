//! Executor seams.
//!
//! Extraction, AI review and refinement are opaque to the coordinators.
//! Implementations live outside this crate; the API binary wires in
//! simulated ones.

use std::time::Duration;

use async_trait::async_trait;
use cookbook_core::refine::RefineCandidate;
use cookbook_core::session::TaskDescriptor;
use serde_json::Value;

/// Why a task, round or refine item did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Output of one extraction task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    /// Opaque result, carried in `task-completed` and fed to review.
    pub result: Value,
    /// Tool calls the executor made, reported for information only.
    pub tool_calls: u32,
}

/// Round 1 outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct QualificationOutcome {
    pub total: u32,
    /// Candidates that continue to round 2.
    pub kept: Vec<Value>,
    pub dropped: u32,
    pub merged: u32,
}

/// Round 2 per-candidate outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementOutcome {
    pub candidate: Value,
    /// Whether the candidate changed.
    pub refined: bool,
}

/// Round 3 outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOutcome {
    pub after_dedup: u32,
    pub relations_found: u32,
}

/// Runs one bootstrap extraction task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &TaskDescriptor) -> ExecutorResult<TaskOutput>;
}

/// Runs the three review rounds over the extracted candidates.
#[async_trait]
pub trait ReviewExecutor: Send + Sync {
    /// Round 1: keep, drop or merge candidates.
    async fn qualify(&self, candidates: &[Value]) -> ExecutorResult<QualificationOutcome>;

    /// Round 2: refine a single kept candidate.
    async fn refine_candidate(&self, candidate: &Value) -> ExecutorResult<RefinementOutcome>;

    /// Round 3: deduplicate and discover relations.
    async fn deduplicate(&self, candidates: &[Value]) -> ExecutorResult<DedupOutcome>;
}

/// Refines one candidate for the refine job. Returns whether it changed.
#[async_trait]
pub trait RefineExecutor: Send + Sync {
    async fn refine(&self, candidate: &RefineCandidate) -> ExecutorResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_failed() {
        let err = ExecutorError::Failed("model unavailable".to_string());
        assert_eq!(err.to_string(), "model unavailable");
    }

    #[test]
    fn display_timeout() {
        let err = ExecutorError::Timeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "timed out after 300s");
    }

    #[test]
    fn display_cancelled() {
        assert_eq!(ExecutorError::Cancelled.to_string(), "cancelled");
    }
}
