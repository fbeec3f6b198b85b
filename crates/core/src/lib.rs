//! Domain model for the cookbook batch-job tracking protocol.
//!
//! Pure data and transition logic with no runtime dependencies, shared by the
//! coordinator (server) and the observer (client):
//!
//! - [`session`]: bootstrap sessions and their tasks.
//! - [`review`]: the three sequential review rounds.
//! - [`refine`]: the single-level refine job.
//! - [`protocol`]: events and snapshots as they appear on the wire.
//! - [`progress`]: percent/ETA arithmetic and the [`JobSession`](progress::JobSession) view.

pub mod error;
pub mod progress;
pub mod protocol;
pub mod refine;
pub mod review;
pub mod session;
pub mod types;
