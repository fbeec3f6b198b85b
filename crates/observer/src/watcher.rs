//! Connection loop: connect, pull snapshots, apply events, reconnect.

use std::sync::Arc;

use cookbook_core::protocol::{JobEvent, JobKind};
use tokio_util::sync::CancellationToken;

use crate::api::SnapshotApi;
use crate::client::{EventClient, EventConnection, Frame};
use crate::config::ObserverConfig;
use crate::notify::Notifier;
use crate::reconciler::Reconciler;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Transport signals observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Connected,
    Disconnected,
    Reconnected,
}

/// Follows the job server until cancelled.
pub struct Watcher {
    client: EventClient,
    api: SnapshotApi,
    reconnect: ReconnectConfig,
    reconciler: Reconciler,
}

impl Watcher {
    pub fn new(config: &ObserverConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client: EventClient::new(config.ws_url()),
            api: SnapshotApi::new(config.api_url()),
            reconnect: ReconnectConfig::default(),
            reconciler: Reconciler::new(notifier),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run until `cancel` fires and hand back the reconciled state.
    pub async fn run(mut self, cancel: CancellationToken) -> Reconciler {
        let mut conn = match self.client.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
                match reconnect_loop(&self.client, &self.reconnect, &cancel).await {
                    Some(conn) => conn,
                    None => return self.reconciler,
                }
            }
        };
        let mut signal = Transport::Connected;

        loop {
            self.on_transport(signal).await;
            if !self.pump(&mut conn, &cancel).await {
                return self.reconciler;
            }
            self.on_transport(Transport::Disconnected).await;

            conn = match reconnect_loop(&self.client, &self.reconnect, &cancel).await {
                Some(conn) => conn,
                None => return self.reconciler,
            };
            signal = Transport::Reconnected;
        }
    }

    /// Apply events until the connection drops (`true`) or `cancel` fires
    /// (`false`).
    async fn pump(&mut self, conn: &mut EventConnection, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                frame = conn.next_event() => match frame {
                    Frame::Event(event) => self.handle_event(event),
                    Frame::Skip => {}
                    Frame::Closed => return true,
                },
            }
        }
    }

    async fn on_transport(&mut self, signal: Transport) {
        match signal {
            Transport::Connected | Transport::Reconnected => {
                tracing::info!(?signal, "Event channel up, pulling snapshots");
                self.sync_snapshots().await;
            }
            Transport::Disconnected => {
                tracing::warn!("Event channel lost");
            }
        }
    }

    /// Pull both snapshots and merge them. Failures wait for the next
    /// reconnect.
    async fn sync_snapshots(&mut self) {
        match self.api.bootstrap_status().await {
            Ok(snapshot) => {
                let outcome = self.reconciler.merge_bootstrap_snapshot(snapshot);
                tracing::debug!(?outcome, "Merged bootstrap snapshot");
                self.log_progress(JobKind::Bootstrap);
            }
            Err(e) => tracing::warn!(error = %e, "Bootstrap snapshot unavailable"),
        }
        match self.api.refine_status().await {
            Ok(snapshot) => {
                let outcome = self.reconciler.merge_refine_snapshot(snapshot);
                tracing::debug!(?outcome, "Merged refine snapshot");
                self.log_progress(JobKind::Refine);
            }
            Err(e) => tracing::warn!(error = %e, "Refine snapshot unavailable"),
        }
    }

    fn handle_event(&mut self, event: JobEvent) {
        let kind = event.kind();
        let name = event.name();
        if self.reconciler.apply_event(event) {
            tracing::debug!(event = name, "Applied event");
            self.log_progress(kind);
        } else {
            tracing::trace!(event = name, "Event changed nothing");
        }
    }

    fn log_progress(&self, kind: JobKind) {
        if let Some(report) = self.reconciler.report(kind) {
            tracing::info!(
                kind = %report.kind,
                session_id = %report.session_id,
                progress = report.progress,
                settled = report.settled,
                total = report.total,
                eta_ms = report.eta_ms,
                elapsed_so_far_ms = report.elapsed_so_far_ms,
                running = report.running,
                "Job progress",
            );
        }
    }
}
