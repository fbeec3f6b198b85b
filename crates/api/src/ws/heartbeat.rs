use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::time::MissedTickBehavior;

use crate::ws::manager::WsManager;

/// Ping every observer each `period` so dead sockets surface and their
/// queues get pruned. The first ping goes out one period after start.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let first = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if ws_manager.connection_count().await == 0 {
                continue;
            }
            let delivery = ws_manager.broadcast(Message::Ping(Bytes::new())).await;
            tracing::debug!(
                delivered = delivery.delivered,
                pruned = delivery.pruned,
                "Observer heartbeat",
            );
        }
    })
}
