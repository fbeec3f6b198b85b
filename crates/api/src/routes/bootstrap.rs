//! Route definitions for the bootstrap job.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bootstrap;
use crate::state::AppState;

/// Routes mounted at `/bootstrap`.
///
/// ```text
/// POST   /start     -> start_bootstrap
/// GET    /status    -> get_bootstrap_status
/// POST   /cancel    -> cancel_bootstrap
/// POST   /reset     -> reset_bootstrap
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(bootstrap::start_bootstrap))
        .route("/status", get(bootstrap::get_bootstrap_status))
        .route("/cancel", post(bootstrap::cancel_bootstrap))
        .route("/reset", post(bootstrap::reset_bootstrap))
}
