pub mod bootstrap;
pub mod health;
pub mod refine;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                      WebSocket event channel
///
/// /bootstrap/start         start a bootstrap session (POST)
/// /bootstrap/status        snapshot (GET)
/// /bootstrap/cancel        cancel the running session (POST)
/// /bootstrap/reset         drop a finished session (POST)
///
/// /refine/start            start a refine run (POST)
/// /refine/status           snapshot (GET)
/// /refine/cancel           cancel the running run (POST)
/// /refine/reset            drop a finished run (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/bootstrap", bootstrap::router())
        .nest("/refine", refine::router())
}
