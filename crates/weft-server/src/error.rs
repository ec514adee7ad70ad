//! Error types for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use weft_pipeline::PipelineError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors the HTTP handlers can surface.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The pipeline id has no running/completed execution under the given
    /// execution id (evicted, or never existed).
    #[error("execution not found: {0}")]
    ExecutionNotFound(uuid::Uuid),

    /// Fetching the pipeline descriptor from the host failed.
    #[error("{0}")]
    HostApi(#[from] PipelineError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::HostApi(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY => {
                tracing::error!(%status, error = %message, "request failed");
            }
            _ => tracing::warn!(%status, error = %message, "request failed"),
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// The error body every non-2xx response shares (§6).
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}
