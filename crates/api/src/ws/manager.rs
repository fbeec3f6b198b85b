//! Registry of observers attached to the event channel.
//!
//! Each observer owns an unbounded frame queue drained by its socket task,
//! so fan-out never waits on a slow client. A queue whose socket task is
//! gone is dropped on the next fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

/// Sending half of an observer's frame queue.
pub type FrameSender = mpsc::UnboundedSender<Message>;

struct Observer {
    sender: FrameSender,
    connected_at: DateTime<Utc>,
    frames_sent: AtomicU64,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Queues that accepted the frame.
    pub delivered: usize,
    /// Queues found closed and removed.
    pub pruned: usize,
}

/// Connected observers, keyed by connection id.
pub struct WsManager {
    observers: RwLock<HashMap<String, Observer>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an observer and return the queue its socket task drains.
    pub async fn register(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (sender, rx) = mpsc::unbounded_channel();
        let observer = Observer {
            sender,
            connected_at: Utc::now(),
            frames_sent: AtomicU64::new(0),
        };
        self.observers.write().await.insert(conn_id, observer);
        rx
    }

    /// Detach an observer. Unknown ids are ignored.
    pub async fn unregister(&self, conn_id: &str) {
        if let Some(observer) = self.observers.write().await.remove(conn_id) {
            tracing::debug!(
                conn_id,
                connected_for_secs = (Utc::now() - observer.connected_at).num_seconds(),
                frames_sent = observer.frames_sent.load(Ordering::Relaxed),
                "Observer detached",
            );
        }
    }

    /// Queue `message` for every observer, dropping closed queues.
    pub async fn broadcast(&self, message: Message) -> Delivery {
        let mut closed = Vec::new();
        let delivered = {
            let observers = self.observers.read().await;
            let mut delivered = 0;
            for (conn_id, observer) in observers.iter() {
                if observer.sender.send(message.clone()).is_ok() {
                    observer.frames_sent.fetch_add(1, Ordering::Relaxed);
                    delivered += 1;
                } else {
                    closed.push(conn_id.clone());
                }
            }
            delivered
        };

        if !closed.is_empty() {
            let mut observers = self.observers.write().await;
            for conn_id in &closed {
                observers.remove(conn_id);
            }
            tracing::debug!(pruned = closed.len(), "Dropped closed observer queues");
        }

        Delivery {
            delivered,
            pruned: closed.len(),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Send a Close frame to every observer and detach them all. Returns how
    /// many were attached.
    pub async fn close_all(&self) -> usize {
        let mut observers = self.observers.write().await;
        for observer in observers.values() {
            let _ = observer.sender.send(Message::Close(None));
        }
        let count = observers.len();
        observers.clear();
        tracing::info!(count, "Closed all observer connections");
        count
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
