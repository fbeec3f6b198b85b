//! Bootstrap session and task model.
//!
//! A [`Session`] is one run of the bootstrap job. The same transition
//! methods are driven by the coordinator (as work happens) and by the
//! observer (as events arrive), so both sides agree on what a given
//! sequence of transitions produces.
//!
//! Count invariant, checked by [`Session::counts_consistent`]:
//!
//! ```text
//! completed + failed + filling + skeleton == total
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::progress::{estimate_remaining_ms, percent, JobSession};
use crate::review::ReviewState;
use crate::types::{EpochMillis, SessionId};

/// Upper bound on tasks accepted for a single session.
pub const MAX_SESSION_TASKS: usize = 500;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle of a whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    CompletedWithErrors,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithErrors)
    }
}

/// Lifecycle of one task.
///
/// `skeleton -> filling -> {completed, failed}`; `skeleton -> completed|failed`
/// is also permitted for defensive closure and cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Skeleton,
    Filling,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Immutable descriptor of a task, fixed when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMeta {
    /// Kind of work, e.g. `"dimension"`.
    pub kind: String,
    /// Human-readable label shown next to the progress bar.
    pub label: String,
    /// Kind-specific flags, passed through to the executor untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub flags: serde_json::Map<String, serde_json::Value>,
}

/// A task as declared at session start: `{id, ...meta}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,
    #[serde(flatten)]
    pub meta: TaskMeta,
}

impl TaskDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: TaskMeta {
                kind: kind.into(),
                label: label.into(),
                flags: serde_json::Map::new(),
            },
        }
    }

    /// Attach a kind-specific flag.
    pub fn with_flag(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.flags.insert(key.into(), value);
        self
    }
}

/// One unit of work within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub meta: TaskMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<EpochMillis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    fn from_descriptor(descriptor: &TaskDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            status: TaskStatus::Skeleton,
            meta: descriptor.meta.clone(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// The descriptor this task was created from.
    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.id.clone(),
            meta: self.meta.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One run of the bootstrap job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub filling: u32,
    pub skeleton: u32,
    pub progress: u8,
    pub tasks: Vec<Task>,
    pub started_at: EpochMillis,
    /// Server-side elapsed time, frozen at the last settled task.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tool_calls: Option<u32>,
    #[serde(default)]
    pub review: ReviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

/// Reject task lists a session cannot be built from.
pub fn validate_descriptors(descriptors: &[TaskDescriptor]) -> Result<(), CoreError> {
    if descriptors.is_empty() {
        return Err(CoreError::Validation(
            "A session needs at least one task".to_string(),
        ));
    }
    if descriptors.len() > MAX_SESSION_TASKS {
        return Err(CoreError::Validation(format!(
            "A session accepts at most {MAX_SESSION_TASKS} tasks, got {}",
            descriptors.len()
        )));
    }
    let mut seen = HashSet::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if descriptor.id.trim().is_empty() {
            return Err(CoreError::Validation("Task id must not be empty".to_string()));
        }
        if !seen.insert(descriptor.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate task id '{}'",
                descriptor.id
            )));
        }
    }
    Ok(())
}

impl Session {
    /// Build a running session with every task in `skeleton`.
    ///
    /// Callers validate `descriptors` with [`validate_descriptors`] first.
    pub fn new(id: SessionId, descriptors: &[TaskDescriptor], started_at: EpochMillis) -> Self {
        let tasks: Vec<Task> = descriptors.iter().map(Task::from_descriptor).collect();
        let total = tasks.len() as u32;
        Self {
            id,
            status: SessionStatus::Running,
            total,
            completed: 0,
            failed: 0,
            filling: 0,
            skeleton: total,
            progress: 0,
            tasks,
            started_at,
            elapsed_ms: 0,
            total_tool_calls: None,
            review: ReviewState::default(),
            summary: None,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Task descriptors in declared order.
    pub fn descriptors(&self) -> Vec<TaskDescriptor> {
        self.tasks.iter().map(Task::descriptor).collect()
    }

    /// `completed + failed`.
    pub fn settled(&self) -> u32 {
        self.completed + self.failed
    }

    /// `total - settled`.
    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.settled())
    }

    /// Whether the count invariant holds.
    pub fn counts_consistent(&self) -> bool {
        self.completed + self.failed + self.filling + self.skeleton == self.total
    }

    /// Server-clock ETA for the remaining tasks.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        estimate_remaining_ms(self.elapsed_ms, self.settled(), self.remaining())
    }

    /// Re-derive the count buckets from task statuses and lift progress
    /// to at least the computed value.
    fn recount(&mut self) {
        let (mut skeleton, mut filling, mut completed, mut failed) = (0, 0, 0, 0);
        for task in &self.tasks {
            match task.status {
                TaskStatus::Skeleton => skeleton += 1,
                TaskStatus::Filling => filling += 1,
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
            }
        }
        self.skeleton = skeleton;
        self.filling = filling;
        self.completed = completed;
        self.failed = failed;
        self.total = self.tasks.len() as u32;
        self.raise_progress(percent(self.settled(), self.total));
    }

    /// Lift progress to `progress`; it never decreases.
    pub fn raise_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Record server-side elapsed time; the value only moves forward.
    pub fn record_elapsed(&mut self, elapsed_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.max(elapsed_ms);
    }

    /// `skeleton -> filling`. Returns whether the task changed.
    pub fn start_task(&mut self, task_id: &str, at: EpochMillis) -> bool {
        let Some(task) = self.task_mut(task_id) else {
            return false;
        };
        if task.status != TaskStatus::Skeleton {
            return false;
        }
        task.status = TaskStatus::Filling;
        task.started_at = Some(at);
        self.recount();
        true
    }

    /// `skeleton|filling -> completed`. Returns whether the task changed.
    pub fn complete_task(
        &mut self,
        task_id: &str,
        result: Option<serde_json::Value>,
        at: EpochMillis,
    ) -> bool {
        let Some(task) = self.task_mut(task_id) else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(at);
        task.result = result;
        self.recount();
        true
    }

    /// `skeleton|filling -> failed`. Returns whether the task changed.
    pub fn fail_task(&mut self, task_id: &str, error: impl Into<String>, at: EpochMillis) -> bool {
        let Some(task) = self.task_mut(task_id) else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }
        task.status = TaskStatus::Failed;
        task.completed_at = Some(at);
        task.error = Some(error.into());
        self.recount();
        true
    }

    /// Add `count` to the informational tool-call counter.
    pub fn add_tool_calls(&mut self, count: u32) {
        let current = self.total_tool_calls.unwrap_or(0);
        self.total_tool_calls = Some(current.saturating_add(count));
    }

    /// Force every non-terminal task to `completed`.
    ///
    /// Guards against a lost `task-completed` leaving the session with fewer
    /// than `total` settled tasks once it is terminal. Returns how many tasks
    /// were closed this way.
    pub fn close_open_tasks(&mut self, at: EpochMillis) -> usize {
        let mut closed = 0;
        for task in &mut self.tasks {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Completed;
                task.completed_at.get_or_insert(at);
                closed += 1;
            }
        }
        if closed > 0 {
            self.recount();
        }
        closed
    }

    /// Terminal status the session ends with given its current state.
    pub fn terminal_status(&self) -> SessionStatus {
        if self.failed > 0 || self.review.has_failed() {
            SessionStatus::CompletedWithErrors
        } else {
            SessionStatus::Completed
        }
    }

    /// Close open tasks, settle progress at 100, and enter the terminal
    /// status. Idempotent.
    pub fn finish(&mut self, summary: Option<serde_json::Value>, at: EpochMillis) {
        self.close_open_tasks(at);
        self.raise_progress(100);
        self.status = self.terminal_status();
        if summary.is_some() {
            self.summary = summary;
        }
    }
}

impl JobSession for Session {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn progress(&self) -> u8 {
        self.progress
    }

    fn touched(&self) -> u32 {
        self.filling + self.completed + self.failed
    }

    fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn stage(&self) -> (u8, u8, u8) {
        self.review.stage()
    }
}
