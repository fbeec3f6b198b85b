//! Reference executors wired into the server binary.
//!
//! The real extraction and review backends live outside this repo; the
//! simulated executor lets the job protocol be exercised end to end.

pub mod simulated;

pub use simulated::{SimulatedConfig, SimulatedExecutor};
