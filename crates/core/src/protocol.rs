//! Wire protocol shared by the coordinator, the event channel and observers.
//!
//! Every event travels as one JSON text frame:
//!
//! ```json
//! {"event": "bootstrap:task-completed", "data": {"taskId": "naming", ...}}
//! ```
//!
//! The event enum is closed; a reconciler matching on it is exhaustive.
//! Snapshots are served as `{"data": <session>}` or `{"data": {"status": "idle"}}`
//! and modelled by [`StatusSnapshot`].

use serde::{Deserialize, Serialize};

use crate::session::TaskDescriptor;
use crate::types::{EpochMillis, SessionId};

// ---------------------------------------------------------------------------
// Job kinds
// ---------------------------------------------------------------------------

/// Which job an event or snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Bootstrap,
    Refine,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Refine => "refine",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapStarted {
    pub session_id: SessionId,
    pub total: u32,
    pub tasks: Vec<TaskDescriptor>,
    pub started_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStarted {
    pub task_id: String,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompleted {
    pub task_id: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    pub progress: u8,
    pub completed: u32,
    pub total: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailed {
    pub task_id: String,
    pub error: String,
    pub progress: u8,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllCompleted {
    pub session_id: SessionId,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Review payloads
// ---------------------------------------------------------------------------

/// Shared payload of every `review:roundN-started` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationCompleted {
    pub total: u32,
    pub kept: u32,
    pub dropped: u32,
    pub merged: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementProgress {
    pub current: u32,
    pub total: u32,
    pub progress: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementCompleted {
    pub total: u32,
    pub refined: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupCompleted {
    pub total: u32,
    pub after_dedup: u32,
    pub relations_found: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundFailed {
    /// 1-based round number.
    pub round: u8,
    pub error: String,
}

// ---------------------------------------------------------------------------
// Refine payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineStarted {
    pub session_id: SessionId,
    pub total: u32,
    pub candidate_ids: Vec<String>,
    #[serde(default)]
    pub started_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStarted {
    pub candidate_id: String,
    pub title: String,
    pub current: u32,
    pub total: u32,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCompleted {
    pub candidate_id: String,
    pub title: String,
    pub refined: bool,
    pub current: u32,
    pub total: u32,
    pub progress: u8,
    pub refined_so_far: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailed {
    pub candidate_id: String,
    pub title: String,
    pub error: String,
    pub current: u32,
    pub total: u32,
    pub progress: u8,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineCompleted {
    pub session_id: SessionId,
    pub total: u32,
    pub refined: u32,
    pub failed: u32,
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Every event the coordinator emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum JobEvent {
    #[serde(rename = "bootstrap:started")]
    BootstrapStarted(BootstrapStarted),
    #[serde(rename = "bootstrap:task-started")]
    TaskStarted(TaskStarted),
    #[serde(rename = "bootstrap:task-completed")]
    TaskCompleted(TaskCompleted),
    #[serde(rename = "bootstrap:task-failed")]
    TaskFailed(TaskFailed),
    #[serde(rename = "bootstrap:all-completed")]
    AllCompleted(AllCompleted),

    #[serde(rename = "review:round1-started")]
    Round1Started(RoundStarted),
    #[serde(rename = "review:round1-completed")]
    Round1Completed(QualificationCompleted),
    #[serde(rename = "review:round2-started")]
    Round2Started(RoundStarted),
    #[serde(rename = "review:round2-progress")]
    Round2Progress(RefinementProgress),
    #[serde(rename = "review:round2-completed")]
    Round2Completed(RefinementCompleted),
    #[serde(rename = "review:round3-started")]
    Round3Started(RoundStarted),
    #[serde(rename = "review:round3-completed")]
    Round3Completed(DedupCompleted),
    #[serde(rename = "review:round-failed")]
    RoundFailed(RoundFailed),

    #[serde(rename = "refine:started")]
    RefineStarted(RefineStarted),
    #[serde(rename = "refine:item-started")]
    ItemStarted(ItemStarted),
    #[serde(rename = "refine:item-completed")]
    ItemCompleted(ItemCompleted),
    #[serde(rename = "refine:item-failed")]
    ItemFailed(ItemFailed),
    #[serde(rename = "refine:completed")]
    RefineCompleted(RefineCompleted),
}

impl JobEvent {
    /// Wire name, e.g. `"bootstrap:task-started"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BootstrapStarted(_) => "bootstrap:started",
            Self::TaskStarted(_) => "bootstrap:task-started",
            Self::TaskCompleted(_) => "bootstrap:task-completed",
            Self::TaskFailed(_) => "bootstrap:task-failed",
            Self::AllCompleted(_) => "bootstrap:all-completed",
            Self::Round1Started(_) => "review:round1-started",
            Self::Round1Completed(_) => "review:round1-completed",
            Self::Round2Started(_) => "review:round2-started",
            Self::Round2Progress(_) => "review:round2-progress",
            Self::Round2Completed(_) => "review:round2-completed",
            Self::Round3Started(_) => "review:round3-started",
            Self::Round3Completed(_) => "review:round3-completed",
            Self::RoundFailed(_) => "review:round-failed",
            Self::RefineStarted(_) => "refine:started",
            Self::ItemStarted(_) => "refine:item-started",
            Self::ItemCompleted(_) => "refine:item-completed",
            Self::ItemFailed(_) => "refine:item-failed",
            Self::RefineCompleted(_) => "refine:completed",
        }
    }

    /// Job the event belongs to. Review rounds are part of bootstrap.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::RefineStarted(_)
            | Self::ItemStarted(_)
            | Self::ItemCompleted(_)
            | Self::ItemFailed(_)
            | Self::RefineCompleted(_) => JobKind::Refine,
            _ => JobKind::Bootstrap,
        }
    }

    /// Session id for the events that carry one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::BootstrapStarted(e) => Some(&e.session_id),
            Self::AllCompleted(e) => Some(&e.session_id),
            Self::RefineStarted(e) => Some(&e.session_id),
            Self::RefineCompleted(e) => Some(&e.session_id),
            _ => None,
        }
    }

    /// Whether this event ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AllCompleted(_) | Self::RefineCompleted(_))
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleTag {
    #[default]
    Idle,
}

/// `{"status": "idle"}`, served when no session exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleStatus {
    pub status: IdleTag,
}

/// Body of a status snapshot: an active or finished session, or idle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusSnapshot<T> {
    Active(T),
    Idle(IdleStatus),
}

impl<T> StatusSnapshot<T> {
    pub fn into_session(self) -> Option<T> {
        match self {
            Self::Active(session) => Some(session),
            Self::Idle(_) => None,
        }
    }
}

impl<T> From<Option<T>> for StatusSnapshot<T> {
    fn from(session: Option<T>) -> Self {
        match session {
            Some(session) => Self::Active(session),
            None => Self::Idle(IdleStatus::default()),
        }
    }
}
