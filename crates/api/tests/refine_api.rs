//! Integration tests for the `/api/v1/refine` routes.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_empty, post_json, wait_for_status};
use serde_json::json;

const STATUS: &str = "/api/v1/refine/status";

// ---------------------------------------------------------------------------
// Test: status is idle before any run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_is_idle_initially() {
    let (app, _state) = common::build_test_app();
    let json = body_json(get(app, STATUS).await).await;

    assert_eq!(json["data"]["status"], "idle");
}

// ---------------------------------------------------------------------------
// Test: start returns 202 and the run completes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_runs_to_completion() {
    let (app, _state) = common::build_test_app();

    let response = post_json(
        app.clone(),
        "/api/v1/refine/start",
        json!({ "candidates": [
            { "candidateId": "c1", "title": "Braised leeks" },
            { "candidateId": "c2", "title": "" },
        ] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let session_id = body_json(response).await["data"]["sessionId"].clone();

    let json = wait_for_status(&app, STATUS, &["completed"]).await;
    let data = &json["data"];
    assert_eq!(data["id"], session_id);
    assert_eq!(data["total"], 2);
    assert_eq!(data["refined"], 1);
    assert_eq!(data["failed"], 1);
    assert_eq!(data["progress"], 100);
    assert_eq!(data["items"][1]["status"], "failed");
}

// ---------------------------------------------------------------------------
// Test: empty candidate list returns 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_candidate_list_returns_400() {
    let (app, _state) = common::build_test_app();

    let response = post_json(app, "/api/v1/refine/start", json!({ "candidates": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: cancel and reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_when_idle_returns_409() {
    let (app, _state) = common::build_test_app();

    let response = post_empty(app, "/api/v1/refine/cancel").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "NO_ACTIVE_SESSION");
}

#[tokio::test]
async fn cancel_then_reset_returns_to_idle() {
    let (app, _state) = common::build_test_app_with(common::slow_executor());

    post_json(
        app.clone(),
        "/api/v1/refine/start",
        json!({ "candidates": [
            { "candidateId": "c1", "title": "A" },
            { "candidateId": "c2", "title": "B" },
        ] }),
    )
    .await;

    let response = post_empty(app.clone(), "/api/v1/refine/reset").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "SESSION_RUNNING");

    let response = post_empty(app.clone(), "/api/v1/refine/cancel").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = wait_for_status(&app, STATUS, &["completed"]).await;
    assert_eq!(json["data"]["failed"], 2);
    assert_eq!(json["data"]["items"][0]["error"], "cancelled");

    let response = post_empty(app.clone(), "/api/v1/refine/reset").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(get(app, STATUS).await).await;
    assert_eq!(json["data"]["status"], "idle");
}
