use std::time::Duration;

/// Default number of tasks executed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default per-task timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Worker pool settings shared by both coordinators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tasks running at the same time (default: `4`, minimum `1`).
    pub max_concurrency: usize,
    /// Wall-clock limit for a single task or refine item (default: `300s`).
    pub task_timeout: Duration,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `PIPELINE_MAX_CONCURRENCY`   | `4`     |
    /// | `PIPELINE_TASK_TIMEOUT_SECS` | `300`   |
    pub fn from_env() -> Self {
        let max_concurrency: usize = std::env::var("PIPELINE_MAX_CONCURRENCY")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENCY.to_string())
            .parse()
            .expect("PIPELINE_MAX_CONCURRENCY must be a valid usize");

        let task_timeout_secs: u64 = std::env::var("PIPELINE_TASK_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TASK_TIMEOUT.as_secs().to_string())
            .parse()
            .expect("PIPELINE_TASK_TIMEOUT_SECS must be a valid u64");

        Self {
            max_concurrency: max_concurrency.max(1),
            task_timeout: Duration::from_secs(task_timeout_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}
