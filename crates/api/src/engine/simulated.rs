//! Simulated executor.
//!
//! Sleeps for a configured delay and succeeds. A bootstrap task whose
//! descriptor carries `"fail": true` in its flags fails instead, and so does
//! a refine candidate whose title is empty.

use std::time::Duration;

use async_trait::async_trait;
use cookbook_core::refine::RefineCandidate;
use cookbook_core::session::TaskDescriptor;
use cookbook_pipeline::executor::{
    DedupOutcome, ExecutorError, ExecutorResult, QualificationOutcome, RefinementOutcome,
    TaskOutput,
};
use cookbook_pipeline::{RefineExecutor, ReviewExecutor, TaskExecutor};
use serde_json::{json, Value};

/// Tool calls reported per simulated task.
const DEFAULT_TOOL_CALLS: u32 = 3;

/// Timing for the simulated executor.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Delay per task, review round and refine item.
    pub task_delay: Duration,
    /// Tool calls reported by each successful task.
    pub tool_calls: u32,
}

impl SimulatedConfig {
    /// Load from the environment.
    ///
    /// | Env Var             | Default |
    /// |---------------------|---------|
    /// | `SIMULATED_TASK_MS` | `250`   |
    pub fn from_env() -> Self {
        let task_ms: u64 = std::env::var("SIMULATED_TASK_MS")
            .unwrap_or_else(|_| "250".into())
            .parse()
            .expect("SIMULATED_TASK_MS must be a valid u64");
        Self {
            task_delay: Duration::from_millis(task_ms),
            tool_calls: DEFAULT_TOOL_CALLS,
        }
    }

    /// No delay; used by the integration tests.
    pub fn instant() -> Self {
        Self {
            task_delay: Duration::ZERO,
            tool_calls: DEFAULT_TOOL_CALLS,
        }
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            task_delay: Duration::from_millis(250),
            tool_calls: DEFAULT_TOOL_CALLS,
        }
    }
}

/// Executor implementing every seam with canned behaviour.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    config: SimulatedConfig,
}

impl SimulatedExecutor {
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }

    async fn pause(&self) {
        if !self.config.task_delay.is_zero() {
            tokio::time::sleep(self.config.task_delay).await;
        }
    }
}

fn should_fail(task: &TaskDescriptor) -> bool {
    task.meta.flags.get("fail").and_then(Value::as_bool) == Some(true)
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, task: &TaskDescriptor) -> ExecutorResult<TaskOutput> {
        self.pause().await;
        if should_fail(task) {
            return Err(ExecutorError::Failed(format!(
                "simulated failure for {}",
                task.id
            )));
        }
        Ok(TaskOutput {
            result: json!({
                "taskId": task.id,
                "kind": task.meta.kind,
                "label": task.meta.label,
            }),
            tool_calls: self.config.tool_calls,
        })
    }
}

#[async_trait]
impl ReviewExecutor for SimulatedExecutor {
    async fn qualify(&self, candidates: &[Value]) -> ExecutorResult<QualificationOutcome> {
        self.pause().await;
        Ok(QualificationOutcome {
            total: candidates.len() as u32,
            kept: candidates.to_vec(),
            dropped: 0,
            merged: 0,
        })
    }

    async fn refine_candidate(&self, candidate: &Value) -> ExecutorResult<RefinementOutcome> {
        self.pause().await;
        Ok(RefinementOutcome {
            candidate: candidate.clone(),
            refined: true,
        })
    }

    async fn deduplicate(&self, candidates: &[Value]) -> ExecutorResult<DedupOutcome> {
        self.pause().await;
        let after_dedup = candidates.len() as u32;
        Ok(DedupOutcome {
            after_dedup,
            relations_found: after_dedup.saturating_sub(1),
        })
    }
}

#[async_trait]
impl RefineExecutor for SimulatedExecutor {
    async fn refine(&self, candidate: &RefineCandidate) -> ExecutorResult<bool> {
        self.pause().await;
        if candidate.title.trim().is_empty() {
            return Err(ExecutorError::Failed(format!(
                "candidate {} has no title",
                candidate.candidate_id
            )));
        }
        Ok(true)
    }
}
