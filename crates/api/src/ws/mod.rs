//! WebSocket event channel.
//!
//! Connection management, heartbeat, the HTTP upgrade handler, and the
//! forwarder that writes bus events to every connected observer.

mod forwarder;
mod handler;
mod heartbeat;
pub mod manager;

pub use forwarder::{encode_event, start_event_forwarder};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::{Delivery, WsManager};
