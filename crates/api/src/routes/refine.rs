//! Route definitions for the refine job.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::refine;
use crate::state::AppState;

/// Routes mounted at `/refine`.
///
/// ```text
/// POST   /start     -> start_refine
/// GET    /status    -> get_refine_status
/// POST   /cancel    -> cancel_refine
/// POST   /reset     -> reset_refine
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(refine::start_refine))
        .route("/status", get(refine::get_refine_status))
        .route("/cancel", post(refine::cancel_refine))
        .route("/reset", post(refine::reset_refine))
}
