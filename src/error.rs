use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Crate-wide error type.
///
/// Structural errors (`NotFound`, `SlotsFull`, `ParentNotPublic`) are
/// violations of tree invariants; policy errors (`NotVisible`,
/// `DuplicateVote`, `RateLimited`, `NotPublic`) are expected business-rule
/// rejections. Both are user-facing and carry enough data for the caller to
/// render a response. `Database`, `Timeout` and `Internal` are opaque to
/// callers and logged here.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    SlotsFull(String),
    ParentNotPublic(String),
    NotVisible(String),
    NotPublic(String),
    DuplicateVote { scene_id: i64, remaining: i64 },
    RateLimited { seconds_left: i64 },
    Validation { field: String, message: String },
    Unauthorized(String),
    Forbidden(String),
    Database(String),
    Timeout(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::SlotsFull(msg) => write!(f, "No free child slots: {}", msg),
            AppError::ParentNotPublic(msg) => write!(f, "Parent not public: {}", msg),
            AppError::NotVisible(msg) => write!(f, "Not visible: {}", msg),
            AppError::NotPublic(msg) => write!(f, "Not public: {}", msg),
            AppError::DuplicateVote { scene_id, remaining } => write!(
                f,
                "Your vote is already counted for scene id={}! Remaining daily ratings: {}",
                scene_id, remaining
            ),
            AppError::RateLimited { seconds_left } => {
                let hrs = seconds_left / 3600;
                let min = seconds_left % 3600 / 60;
                let sec = seconds_left % 60;
                write!(
                    f,
                    "Daily vote limit reached. Time remaining: {}h:{}m:{}s",
                    hrs, min, sec
                )
            }
            AppError::Validation { field, message } => {
                write!(f, "Validation error ({}): {}", field, message)
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::SlotsFull(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::ParentNotPublic(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotVisible(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotPublic(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::DuplicateVote { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Timeout(msg) => {
                tracing::warn!("Storage timeout: {}", msg);
                (StatusCode::REQUEST_TIMEOUT, "Storage timeout, retry later".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        match &self {
            AppError::DuplicateVote { remaining, .. } => {
                body["remaining"] = json!(remaining);
            }
            AppError::RateLimited { seconds_left } => {
                body["seconds_left"] = json!(seconds_left);
            }
            AppError::Validation { field, .. } => {
                body["field"] = json!(field);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
