//! Authoritative per-kind session store.
//!
//! A [`SessionStore`] holds at most one session. Each transition runs a
//! closure against the session and publishes the event it returns while the
//! write lock is still held, so a snapshot read can never observe a state
//! whose event has not been published yet, and events leave in the order the
//! state changed.
//!
//! Writes name the session they target. A runner whose session was replaced
//! (superseded or reset) has every further write rejected.

use std::sync::Arc;

use cookbook_core::error::CoreError;
use cookbook_core::progress::JobSession;
use cookbook_core::protocol::JobEvent;
use cookbook_core::types::SessionId;
use cookbook_events::EventBus;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct Slot<S> {
    session: S,
    cancel: CancellationToken,
}

/// Single-writer store for one job kind.
pub struct SessionStore<S> {
    slot: RwLock<Option<Slot<S>>>,
    bus: Arc<EventBus>,
}

impl<S: JobSession> SessionStore<S> {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            slot: RwLock::new(None),
            bus,
        }
    }

    /// Install `session` as the current one and publish `started`.
    ///
    /// A session still running is cancelled first; its runner's later
    /// writes are rejected because the id no longer matches.
    pub async fn begin(&self, session: S, started: JobEvent) -> CancellationToken {
        let mut slot = self.slot.write().await;
        if let Some(previous) = slot.as_ref() {
            if previous.session.is_running() {
                tracing::info!(
                    session_id = %previous.session.session_id(),
                    superseded_by = %session.session_id(),
                    "Superseding running session",
                );
                previous.cancel.cancel();
            }
        }
        let cancel = CancellationToken::new();
        *slot = Some(Slot {
            session,
            cancel: cancel.clone(),
        });
        self.bus.publish(started);
        cancel
    }

    /// Apply a transition to session `session_id`.
    ///
    /// The closure returns the event to publish, or `None` when the
    /// transition was a no-op. Returns `false` if `session_id` is no longer
    /// the current session, in which case nothing is mutated or published.
    pub async fn update<F>(&self, session_id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut S) -> Option<JobEvent>,
    {
        let mut slot = self.slot.write().await;
        let Some(current) = slot.as_mut() else {
            return false;
        };
        if current.session.session_id() != session_id {
            tracing::debug!(
                session_id,
                current = %current.session.session_id(),
                "Dropping write from replaced session",
            );
            return false;
        }
        if let Some(event) = apply(&mut current.session) {
            self.bus.publish(event);
        }
        true
    }

    /// Consistent copy of the current session, if any.
    pub async fn snapshot(&self) -> Option<S> {
        self.slot.read().await.as_ref().map(|s| s.session.clone())
    }

    /// Id of the current session, if any.
    pub async fn current_id(&self) -> Option<SessionId> {
        self.slot
            .read()
            .await
            .as_ref()
            .map(|s| s.session.session_id().to_string())
    }

    pub async fn is_running(&self) -> bool {
        self.slot
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.session.is_running())
    }

    /// Request cancellation of the running session.
    ///
    /// The runner settles the remaining work and emits the terminal event
    /// itself. Fails with [`CoreError::NoActiveSession`] when nothing is
    /// running.
    pub async fn cancel_running(&self) -> Result<SessionId, CoreError> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(current) if current.session.is_running() => {
                current.cancel.cancel();
                Ok(current.session.session_id().to_string())
            }
            _ => Err(CoreError::NoActiveSession),
        }
    }

    /// Drop a finished session so the snapshot returns to idle.
    ///
    /// Resetting an empty store is a no-op. Fails with
    /// [`CoreError::SessionRunning`] while a session is running.
    pub async fn reset(&self) -> Result<(), CoreError> {
        let mut slot = self.slot.write().await;
        if let Some(current) = slot.as_ref() {
            if current.session.is_running() {
                return Err(CoreError::SessionRunning {
                    session_id: current.session.session_id().to_string(),
                });
            }
        }
        *slot = None;
        Ok(())
    }

    /// Cancel whatever is running. Used during shutdown.
    pub async fn cancel_all(&self) {
        if let Some(current) = self.slot.read().await.as_ref() {
            current.cancel.cancel();
        }
    }
}
