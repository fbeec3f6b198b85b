//! User-visible completion notifications.

use std::fmt;

use cookbook_core::protocol::JobKind;
use cookbook_core::types::SessionId;

/// A finished session, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: JobKind,
    pub session_id: SessionId,
    pub total: u32,
    /// Completed tasks (bootstrap) or refined candidates (refine).
    pub succeeded: u32,
    pub failed: u32,
    pub with_errors: bool,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.with_errors {
            "finished with errors"
        } else {
            "finished"
        };
        write!(
            f,
            "{} session {} {outcome}: {}/{} succeeded, {} failed",
            self.kind, self.session_id, self.succeeded, self.total, self.failed
        )
    }
}

/// Delivers completion notifications. Called at most once per session.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Notifier that writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        if notification.with_errors {
            tracing::warn!(
                kind = %notification.kind,
                session_id = %notification.session_id,
                "{notification}",
            );
        } else {
            tracing::info!(
                kind = %notification.kind,
                session_id = %notification.session_id,
                "{notification}",
            );
        }
    }
}
