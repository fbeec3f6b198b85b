//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] carries every [`JobEvent`] the coordinators emit. It is
//! shared as `Arc<EventBus>` between the coordinators (publishers) and the
//! WebSocket forwarder (subscriber).
//!
//! Delivery is best-effort: a receiver that falls more than the channel
//! capacity behind loses the oldest events and keeps going.

use cookbook_core::protocol::JobEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use cookbook_core::protocol::{JobEvent, TaskStarted};
/// use cookbook_events::EventBus;
///
/// let bus = EventBus::default();
/// let _sub = bus.subscribe();
///
/// bus.publish(JobEvent::TaskStarted(TaskStarted { task_id: "naming".into(), progress: 0 }));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped; emission never blocks.
    pub fn publish(&self, event: JobEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event on the bus.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions, reported by `/health`.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receiving end of the bus.
pub struct Subscription {
    receiver: broadcast::Receiver<JobEvent>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the bus is dropped. Lag is logged and skipped.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
