//! Handlers for the bootstrap job.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cookbook_core::protocol::{IdleStatus, StatusSnapshot};
use cookbook_core::session::TaskDescriptor;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{DataResponse, SessionRef};
use crate::state::AppState;

/// Body of `POST /bootstrap/start`.
#[derive(Debug, Deserialize)]
pub struct StartBootstrap {
    pub tasks: Vec<TaskDescriptor>,
}

/// POST /api/v1/bootstrap/start
///
/// Start a session and return 202 with its id. A running session is
/// superseded.
pub async fn start_bootstrap(
    State(state): State<AppState>,
    payload: Result<Json<StartBootstrap>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let session_id = state.bootstrap.start_session(input.tasks).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SessionRef { session_id },
        }),
    ))
}

/// GET /api/v1/bootstrap/status
pub async fn get_bootstrap_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = StatusSnapshot::from(state.bootstrap.get_status().await);
    Json(DataResponse { data: snapshot })
}

/// POST /api/v1/bootstrap/cancel
///
/// 202 once cancellation is requested; the terminal event follows on the
/// event channel. 409 when nothing is running.
pub async fn cancel_bootstrap(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let session_id = state.bootstrap.cancel().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SessionRef { session_id },
        }),
    ))
}

/// POST /api/v1/bootstrap/reset
///
/// Drop a finished session. 409 while running.
pub async fn reset_bootstrap(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.bootstrap.reset().await?;
    tracing::info!("Bootstrap session reset");
    Ok(Json(DataResponse {
        data: IdleStatus::default(),
    }))
}
