use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// No (project, endpoint) pair matched the request.
    EndpointNotFound { path: String, method: String },
    NotFound(String),
    Unauthorized(String),
    RateLimited(String),
    DailyLimitExceeded { used: i64, limit: i64 },
    StorageLimitExceeded,
    ValidationFailed(Vec<String>),
    MalformedInput(String),
    UploadFailed(String),
    Internal(String),
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::EndpointNotFound { path, method } => {
                write!(f, "Endpoint not found: {method} {path}")
            }
            EngineError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            EngineError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            EngineError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            EngineError::DailyLimitExceeded { used, limit } => {
                write!(f, "Daily limit exceeded: {used}/{limit}")
            }
            EngineError::StorageLimitExceeded => write!(f, "Storage limit exceeded"),
            EngineError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {}", errors.join("; "))
            }
            EngineError::MalformedInput(msg) => write!(f, "Malformed input: {msg}"),
            EngineError::UploadFailed(msg) => write!(f, "Upload failed: {msg}"),
            EngineError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            EngineError::Store(err) => write!(f, "Store Error: {err}"),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            EngineError::EndpointNotFound { path, method } => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Endpoint not found", "path": path, "method": method }),
            ),
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            EngineError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "message": msg }),
            ),
            EngineError::RateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "Rate limit exceeded", "message": msg }),
            ),
            EngineError::DailyLimitExceeded { used, limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Daily request limit exceeded",
                    "message": format!("Used {used} of {limit} requests in the current 24h window"),
                }),
            ),
            EngineError::StorageLimitExceeded => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Storage limit exceeded", "readOnlyMode": true }),
            ),
            EngineError::ValidationFailed(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "details": errors }),
            ),
            EngineError::MalformedInput(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            EngineError::UploadFailed(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "File upload failed", "message": msg }),
            ),
            EngineError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            EngineError::Store(err) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store(err)
    }
}
