//! Integration tests for the `/api/v1/bootstrap` routes.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_empty, post_json, wait_for_status};
use serde_json::json;

const STATUS: &str = "/api/v1/bootstrap/status";

fn three_tasks() -> serde_json::Value {
    json!({
        "tasks": [
            { "id": "t1", "kind": "recipe", "label": "Soup" },
            { "id": "t2", "kind": "recipe", "label": "Stew", "flags": { "fail": true } },
            { "id": "t3", "kind": "technique", "label": "Braise" },
        ]
    })
}

// ---------------------------------------------------------------------------
// Test: status is idle before any session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_is_idle_initially() {
    let (app, _state) = common::build_test_app();
    let response = get(app, STATUS).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "data": { "status": "idle" } }));
}

// ---------------------------------------------------------------------------
// Test: start returns 202 and the session runs to completed_with_errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_runs_session_to_completion() {
    let (app, _state) = common::build_test_app();

    let response = post_json(app.clone(), "/api/v1/bootstrap/start", three_tasks()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let session_id = body_json(response).await["data"]["sessionId"]
        .as_str()
        .unwrap()
        .to_string();

    let json = wait_for_status(&app, STATUS, &["completed", "completed_with_errors"]).await;
    let data = &json["data"];
    assert_eq!(data["id"], session_id);
    assert_eq!(data["status"], "completed_with_errors");
    assert_eq!(data["total"], 3);
    assert_eq!(data["completed"], 2);
    assert_eq!(data["failed"], 1);
    assert_eq!(data["progress"], 100);
    assert_eq!(data["tasks"][1]["status"], "failed");
    assert_eq!(data["tasks"][1]["error"], "simulated failure for t2");
    assert_eq!(data["review"]["activeRound"], 3);
    assert_eq!(data["summary"]["cancelled"], false);
}

// ---------------------------------------------------------------------------
// Test: validation failures return 400 and leave the job idle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_task_list_returns_400() {
    let (app, _state) = common::build_test_app();

    let response = post_json(app.clone(), "/api/v1/bootstrap/start", json!({ "tasks": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let json = body_json(get(app, STATUS).await).await;
    assert_eq!(json["data"]["status"], "idle");
}

#[tokio::test]
async fn duplicate_task_ids_return_400() {
    let (app, _state) = common::build_test_app();

    let response = post_json(
        app,
        "/api/v1/bootstrap/start",
        json!({ "tasks": [
            { "id": "t1", "kind": "recipe", "label": "A" },
            { "id": "t1", "kind": "recipe", "label": "B" },
        ] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: cancel and reset conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_when_idle_returns_409() {
    let (app, _state) = common::build_test_app();

    let response = post_empty(app, "/api/v1/bootstrap/cancel").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_ACTIVE_SESSION");
    assert_eq!(json["error"], "No session is running");
}

#[tokio::test]
async fn reset_while_running_returns_409() {
    let (app, _state) = common::build_test_app_with(common::slow_executor());

    let response = post_json(app.clone(), "/api/v1/bootstrap/start", three_tasks()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let session_id = body_json(response).await["data"]["sessionId"].clone();

    let response = post_empty(app.clone(), "/api/v1/bootstrap/reset").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SESSION_RUNNING");
    assert_eq!(json["sessionId"], session_id);

    post_empty(app, "/api/v1/bootstrap/cancel").await;
}

// ---------------------------------------------------------------------------
// Test: a body that does not decode gets the error envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_start_body_returns_error_envelope() {
    let (app, _state) = common::build_test_app();

    let body = json!({ "tasks": "soup" });
    let response = post_json(app.clone(), "/api/v1/bootstrap/start", body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_BODY");
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));

    let json = body_json(get(app, STATUS).await).await;
    assert_eq!(json["data"]["status"], "idle");
}

// ---------------------------------------------------------------------------
// Test: cancel then reset returns the job to idle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_then_reset_returns_to_idle() {
    let (app, _state) = common::build_test_app_with(common::slow_executor());

    let response = post_json(app.clone(), "/api/v1/bootstrap/start", three_tasks()).await;
    let session_id = body_json(response).await["data"]["sessionId"].clone();

    let response = post_empty(app.clone(), "/api/v1/bootstrap/cancel").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["data"]["sessionId"], session_id);

    let json = wait_for_status(&app, STATUS, &["completed", "completed_with_errors"]).await;
    assert_eq!(json["data"]["id"], session_id);
    assert_eq!(json["data"]["status"], "completed_with_errors");
    assert_eq!(json["data"]["failed"], 3);
    assert_eq!(json["data"]["summary"]["cancelled"], true);

    let response = post_empty(app.clone(), "/api/v1/bootstrap/reset").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "idle");

    let json = body_json(get(app, STATUS).await).await;
    assert_eq!(json["data"]["status"], "idle");
}
