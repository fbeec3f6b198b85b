//! Bus-to-WebSocket bridge.
//!
//! One long-lived task drains a bus subscription and writes each event as a
//! single JSON text frame `{"event": ..., "data": ...}` to every connected
//! observer, in emission order.

use std::sync::Arc;

use axum::extract::ws::Message;
use cookbook_core::protocol::JobEvent;
use cookbook_events::Subscription;

use crate::ws::manager::WsManager;

/// Encode an event as its wire frame.
pub fn encode_event(event: &JobEvent) -> Result<Message, serde_json::Error> {
    let text = serde_json::to_string(event)?;
    Ok(Message::Text(text.into()))
}

/// Spawn the forwarder. It ends when the bus is dropped.
pub fn start_event_forwarder(
    mut subscription: Subscription,
    ws_manager: Arc<WsManager>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match encode_event(&event) {
                Ok(frame) => {
                    let delivery = ws_manager.broadcast(frame).await;
                    tracing::trace!(
                        event = event.name(),
                        delivered = delivery.delivered,
                        pruned = delivery.pruned,
                        "Event forwarded",
                    );
                }
                Err(e) => {
                    tracing::error!(event = event.name(), error = %e, "Failed to encode event");
                }
            }
        }
        tracing::info!("Event forwarder stopped");
    })
}
