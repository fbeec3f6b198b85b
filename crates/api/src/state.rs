use std::sync::Arc;

use cookbook_events::EventBus;
use cookbook_pipeline::{BootstrapCoordinator, RefineCoordinator};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is an `Arc` or an `Arc`-backed handle.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (observer clients).
    pub ws_manager: Arc<WsManager>,
    /// Event bus the coordinators publish on.
    pub event_bus: Arc<EventBus>,
    /// Bootstrap job coordinator.
    pub bootstrap: BootstrapCoordinator,
    /// Refine job coordinator.
    pub refine: RefineCoordinator,
}
