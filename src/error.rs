use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Catalog query error: {0}")]
    Query(#[from] QueryError),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Failure to derive the request context
#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error("unparseable local datetime '{0}'")]
    InvalidTimestamp(String),
}

/// Failure of a single catalog query
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query timed out after {0} ms")]
    Timeout(u64),

    #[error("failed to decode tour row {id}: {reason}")]
    Decode { id: i64, reason: String },
}

/// Failure of the external text generator. Never surfaced to callers.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generator returned no text")]
    EmptyResponse,

    #[error("generation timed out after {0} ms")]
    Timeout(u64),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Context(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Query(_) | AppError::Cache(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
