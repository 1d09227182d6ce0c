use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::layout::PolicyError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fit policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Preview session limit reached ({0})")]
    TooManySessions(usize),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Policy(e) => (StatusCode::BAD_REQUEST, "INVALID_POLICY", e.to_string()),
            AppError::TooManySessions(limit) => (
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_SESSIONS",
                format!("At most {limit} preview sessions may be open at once"),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
