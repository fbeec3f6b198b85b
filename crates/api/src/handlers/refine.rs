//! Handlers for the refine job.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cookbook_core::protocol::{IdleStatus, StatusSnapshot};
use cookbook_core::refine::RefineCandidate;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{DataResponse, SessionRef};
use crate::state::AppState;

/// Body of `POST /refine/start`.
#[derive(Debug, Deserialize)]
pub struct StartRefine {
    pub candidates: Vec<RefineCandidate>,
}

/// POST /api/v1/refine/start
pub async fn start_refine(
    State(state): State<AppState>,
    payload: Result<Json<StartRefine>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let session_id = state.refine.start_session(input.candidates).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SessionRef { session_id },
        }),
    ))
}

/// GET /api/v1/refine/status
pub async fn get_refine_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = StatusSnapshot::from(state.refine.get_status().await);
    Json(DataResponse { data: snapshot })
}

/// POST /api/v1/refine/cancel
pub async fn cancel_refine(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let session_id = state.refine.cancel().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SessionRef { session_id },
        }),
    ))
}

/// POST /api/v1/refine/reset
pub async fn reset_refine(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.refine.reset().await?;
    tracing::info!("Refine session reset");
    Ok(Json(DataResponse {
        data: IdleStatus::default(),
    }))
}
