//! HTTP error mapping for the job endpoints.
//!
//! Every failure leaves as `{"error", "code"}`; lifecycle conflicts also name
//! the session they refer to so a client can follow up on it.

use std::any::Any;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cookbook_core::error::CoreError;
use serde::Serialize;

/// Application-level error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A lifecycle or validation error from the coordinators.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The start payload could not be decoded.
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    /// No route matched the request path.
    #[error("No route for {0}")]
    RouteNotFound(String),

    /// A handler panicked. The payload is logged, never returned.
    #[error("Handler panicked: {0}")]
    Panic(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Core(CoreError::SessionRunning { .. } | CoreError::NoActiveSession) => {
                StatusCode::CONFLICT
            }
            AppError::InvalidBody(rejection) => rejection.status(),
            AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Core(CoreError::Validation(_)) => "VALIDATION_ERROR",
            AppError::Core(CoreError::SessionRunning { .. }) => "SESSION_RUNNING",
            AppError::Core(CoreError::NoActiveSession) => "NO_ACTIVE_SESSION",
            AppError::InvalidBody(_) => "INVALID_BODY",
            AppError::RouteNotFound(_) => "NOT_FOUND",
            AppError::Panic(_) => "INTERNAL_ERROR",
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, session_id) = match self {
            AppError::Core(CoreError::Validation(msg)) => (msg.clone(), None),
            AppError::Core(CoreError::SessionRunning { session_id }) => {
                (self.to_string(), Some(session_id.clone()))
            }
            AppError::InvalidBody(rejection) => (rejection.body_text(), None),
            AppError::Panic(payload) => {
                tracing::error!(panic = %payload, "Handler panicked");
                ("An internal error occurred".to_string(), None)
            }
            other => (other.to_string(), None),
        };
        ErrorBody {
            error,
            code: self.code(),
            session_id,
        }
    }

    /// Response for a panic caught by `CatchPanicLayer`.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "non-string panic payload".to_string());
        AppError::Panic(message).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
