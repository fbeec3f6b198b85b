//! In-process event channel for job progress.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`Subscription`]: a receiver that can be scoped to one job kind and
//!   skips over lag instead of failing.

pub mod bus;

pub use bus::{EventBus, Subscription};
