use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Provider unreachable, timed out, or answered with a non-success status.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered, but the payload could not be turned into a reading.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown city: {0}")]
    UnknownCity(String),

    #[error("Cannot aggregate an empty batch of readings")]
    EmptyBatch,

    /// Invalid scheduler lifecycle transition (e.g. starting twice).
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl AppError {
    /// Whether a failed fetch is worth another attempt within the same cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Network(msg) | AppError::Parse(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::UnknownCity(city) => {
                (StatusCode::NOT_FOUND, format!("Unknown city {}", city))
            }
            AppError::EmptyBatch | AppError::Scheduler(_) | AppError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Persistence(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}
