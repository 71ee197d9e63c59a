use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Blob written but the metadata insert failed; the blob is orphaned.
    #[error("Partial upload failure: {0}")]
    PartialUpload(String),

    /// Blob delete failed; both blob and record are left intact.
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Error body shape shared by every endpoint
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::UnsupportedMediaType(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::UnsupportedQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::PartialUpload(msg) => {
                tracing::error!("Partial upload failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to upload file".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::DeleteFailed(msg) => {
                tracing::error!("Delete failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to delete file".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upstream request failed".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::Request(e) => {
                tracing::error!("Request error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let body = Json(ErrorBody { error, message });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
