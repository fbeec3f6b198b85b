#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cookbook_core::protocol::JobEvent;
use cookbook_core::refine::RefineCandidate;
use cookbook_core::review::ReviewRound;
use cookbook_core::session::TaskDescriptor;
use cookbook_events::{EventBus, Subscription};
use cookbook_pipeline::executor::{
    DedupOutcome, ExecutorResult, QualificationOutcome, RefinementOutcome, RefineExecutor,
    ReviewExecutor, TaskExecutor, TaskOutput,
};
use cookbook_pipeline::{
    BootstrapCoordinator, ExecutorError, PipelineConfig, RefineCoordinator,
};
use serde_json::{json, Value};

/// Tool calls every scripted task reports.
pub const TOOL_CALLS_PER_TASK: u32 = 2;

// ---------------------------------------------------------------------------
// Scripted executors
// ---------------------------------------------------------------------------

/// Task executor driven by task ids:
/// ids in `failing` fail, ids in `hanging` never finish, the rest succeed
/// after `delay`.
#[derive(Default)]
pub struct ScriptedTasks {
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub delay: Duration,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedTasks {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn hanging(ids: &[&str]) -> Self {
        Self {
            hanging: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TaskExecutor for ScriptedTasks {
    async fn execute(&self, task: &TaskDescriptor) -> ExecutorResult<TaskOutput> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(&task.id) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&task.id) {
            return Err(ExecutorError::Failed(format!("{} exploded", task.id)));
        }
        Ok(TaskOutput {
            result: json!({"taskId": task.id, "candidates": 2}),
            tool_calls: TOOL_CALLS_PER_TASK,
        })
    }
}

/// Review executor that keeps everything, refines everything and finds one
/// relation per pair. `fail_round` makes that round's executor call fail.
#[derive(Default)]
pub struct ScriptedReview {
    pub fail_round: Option<ReviewRound>,
}

#[async_trait]
impl ReviewExecutor for ScriptedReview {
    async fn qualify(&self, candidates: &[Value]) -> ExecutorResult<QualificationOutcome> {
        if self.fail_round == Some(ReviewRound::Qualification) {
            return Err(ExecutorError::Failed("qualifier unavailable".into()));
        }
        Ok(QualificationOutcome {
            total: candidates.len() as u32,
            kept: candidates.to_vec(),
            dropped: 0,
            merged: 0,
        })
    }

    async fn refine_candidate(&self, candidate: &Value) -> ExecutorResult<RefinementOutcome> {
        if self.fail_round == Some(ReviewRound::Refinement) {
            return Err(ExecutorError::Failed("refiner unavailable".into()));
        }
        Ok(RefinementOutcome {
            candidate: candidate.clone(),
            refined: true,
        })
    }

    async fn deduplicate(&self, candidates: &[Value]) -> ExecutorResult<DedupOutcome> {
        if self.fail_round == Some(ReviewRound::Dedup) {
            return Err(ExecutorError::Failed("dedup unavailable".into()));
        }
        Ok(DedupOutcome {
            after_dedup: candidates.len() as u32,
            relations_found: candidates.len().saturating_sub(1) as u32,
        })
    }
}

/// Refiner that fails `failing` ids, hangs on `hanging` ids and reports
/// `refined = true` for the rest.
#[derive(Default)]
pub struct ScriptedRefiner {
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
}

#[async_trait]
impl RefineExecutor for ScriptedRefiner {
    async fn refine(&self, candidate: &RefineCandidate) -> ExecutorResult<bool> {
        if self.hanging.contains(&candidate.candidate_id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&candidate.candidate_id) {
            return Err(ExecutorError::Failed("refiner rejected candidate".into()));
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn tasks(ids: &[&str]) -> Vec<TaskDescriptor> {
    ids.iter()
        .map(|id| TaskDescriptor::new(*id, "dimension", format!("Dimension {id}")))
        .collect()
}

pub fn candidates(ids: &[&str]) -> Vec<RefineCandidate> {
    ids.iter()
        .map(|id| RefineCandidate::new(*id, format!("Recipe {id}")))
        .collect()
}

pub fn bootstrap(
    tasks: ScriptedTasks,
    review: ScriptedReview,
    config: PipelineConfig,
) -> (BootstrapCoordinator, Subscription, Arc<ScriptedTasks>) {
    let bus = Arc::new(EventBus::default());
    let sub = bus.subscribe();
    let tasks = Arc::new(tasks);
    let coordinator = BootstrapCoordinator::new(bus, tasks.clone(), Arc::new(review), config);
    (coordinator, sub, tasks)
}

pub fn refine(refiner: ScriptedRefiner) -> (RefineCoordinator, Subscription) {
    let bus = Arc::new(EventBus::default());
    let sub = bus.subscribe();
    let coordinator = RefineCoordinator::new(bus, Arc::new(refiner), PipelineConfig::default());
    (coordinator, sub)
}

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

/// Collect events until a terminal event for `session_id` arrives.
pub async fn collect_until_terminal(sub: &mut Subscription, session_id: &str) -> Vec<JobEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("terminal event should arrive")
            .expect("bus should stay open");
        let done = event.is_terminal() && event.session_id() == Some(session_id);
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Collect whatever is already buffered, waiting at most `wait` for each.
pub async fn drain(sub: &mut Subscription, wait: Duration) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(wait, sub.recv()).await {
        events.push(event);
    }
    events
}

/// Wait until `count` `task-started` events have been seen.
pub async fn wait_for_started_tasks(sub: &mut Subscription, count: usize) -> Vec<JobEvent> {
    let mut events = Vec::new();
    let mut seen = 0;
    while seen < count {
        let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("task-started should arrive")
            .expect("bus should stay open");
        if matches!(event, JobEvent::TaskStarted(_) | JobEvent::ItemStarted(_)) {
            seen += 1;
        }
        events.push(event);
    }
    events
}

pub fn names(events: &[JobEvent]) -> Vec<&'static str> {
    events.iter().map(JobEvent::name).collect()
}
