//! HTTP error mapping for engine errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use skillrun_types::error::EngineError;

/// Error type returned by all handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::ExecutionNotFound(_) | EngineError::NoRunningExecutions(_) => {
                StatusCode::NOT_FOUND
            }
            EngineError::SkillNotReady(_) => StatusCode::CONFLICT,
            EngineError::CircularDependency { .. }
            | EngineError::UnknownDependency { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "data": null,
            "errors": [{ "code": self.code, "message": self.message }],
        });
        (self.status, Json(body)).into_response()
    }
}
