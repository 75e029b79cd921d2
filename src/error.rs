use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
///
/// External-collaborator failures are typed rather than swallowed at the call
/// site: a stage decides whether to skip a source (`SourceUnavailable`) or
/// abort the operation (`CacheCorruption`).
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("{source_name} rate limited")]
    RateLimited { source_name: String },

    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Export error: {0}")]
    Export(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a failed collaborator call.
    pub fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        AppError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) | AppError::MalformedInput(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::SourceUnavailable { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::RateLimited { .. } => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::CacheCorruption(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("cached data was corrupted and has been invalidated, retry: {}", msg),
            ),
            AppError::Cache(_) | AppError::Export(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
