//! Live observer for the cookbook job server.
//!
//! Follows both job kinds over the WebSocket event channel and repairs
//! missed events by merging status snapshots on every (re)connect.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod merge;
pub mod notify;
pub mod reconciler;
pub mod reconnect;
pub mod watcher;

pub use config::ObserverConfig;
pub use error::ObserverError;
pub use notify::{LogNotifier, Notification, Notifier};
pub use reconciler::Reconciler;
pub use watcher::Watcher;
