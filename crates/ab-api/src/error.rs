//! # HTTP error mapping
//!
//! `AppError` lives in ab-core, so responses are built through two thin
//! wrappers: plain-text bodies for mutations, `{"error": ...}` for reads.

use ab_core::AppError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

fn status_and_message(err: &AppError) -> (StatusCode, String) {
    match err {
        AppError::NotFound(entity, _) => (StatusCode::NOT_FOUND, format!("{entity} not found")),
        AppError::IncorrectPassword => (StatusCode::FORBIDDEN, "incorrect password".to_string()),
        AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AppError::Internal(cause) => {
            tracing::error!("request failed: {cause:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

/// Error rendered as a plain-text body.
#[derive(Debug)]
pub struct TextError(pub AppError);

/// Error rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct JsonError(pub AppError);

impl From<AppError> for TextError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<AppError> for JsonError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for TextError {
    fn into_response(self) -> Response {
        status_and_message(&self.0).into_response()
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self.0);
        (status, Json(json!({ "error": message }))).into_response()
    }
}
