//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use cookbook_api::error::AppError;
use cookbook_core::error::CoreError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::Validation maps to 400 with VALIDATION_ERROR code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("Task id must not be empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Task id must not be empty");
    assert!(json.get("sessionId").is_none());
}

// ---------------------------------------------------------------------------
// Test: a running session blocks reset with 409 naming the session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_running_returns_409_with_session_id() {
    let err = AppError::Core(CoreError::SessionRunning {
        session_id: "s-42".to_string(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SESSION_RUNNING");
    assert_eq!(json["error"], "Session s-42 is still running");
    assert_eq!(json["sessionId"], "s-42");
}

// ---------------------------------------------------------------------------
// Test: cancelling with nothing running is 409 NO_ACTIVE_SESSION
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_active_session_returns_409() {
    let (status, json) = error_to_response(AppError::Core(CoreError::NoActiveSession)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "NO_ACTIVE_SESSION");
    assert_eq!(json["error"], "No session is running");
}

// ---------------------------------------------------------------------------
// Test: unmatched routes map to 404 NOT_FOUND
// ---------------------------------------------------------------------------

#[tokio::test]
async fn route_not_found_returns_404() {
    let (status, json) = error_to_response(AppError::RouteNotFound("/nope".into())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "No route for /nope");
}

// ---------------------------------------------------------------------------
// Test: panics map to 500 and never leak the payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panic_returns_500_and_sanitizes_message() {
    let err = AppError::Panic("executor token leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json.to_string().contains("token"));
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn caught_panic_payload_becomes_error_body() {
    let payload: Box<dyn std::any::Any + Send> = Box::new("index out of bounds");
    let response = AppError::from_panic(payload);

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
