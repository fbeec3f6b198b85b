//! Job coordinators for the bootstrap and refine pipelines.
//!
//! - [`SessionStore`]: the single authoritative copy of a job's session.
//!   Every transition mutates the store and publishes its event under one
//!   write lock.
//! - [`BootstrapCoordinator`]: runs extraction tasks through a bounded
//!   worker pool, then the three review rounds.
//! - [`RefineCoordinator`]: sequential per-candidate refinement.
//! - [`executor`]: the trait seams the real extraction and review logic
//!   plugs into.

pub mod bootstrap;
pub mod config;
pub mod executor;
pub mod refine;
pub mod review;
pub mod store;

pub use bootstrap::BootstrapCoordinator;
pub use config::PipelineConfig;
pub use executor::{ExecutorError, RefineExecutor, ReviewExecutor, TaskExecutor};
pub use refine::RefineCoordinator;
pub use store::SessionStore;
