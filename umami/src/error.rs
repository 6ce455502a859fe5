use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UmamiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for UmamiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            UmamiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            UmamiError::StaleReference(msg) => (StatusCode::GONE, msg.clone()),
            UmamiError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            UmamiError::Collaborator(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            UmamiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            UmamiError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            UmamiError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            UmamiError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            UmamiError::Llm(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            UmamiError::LlmUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            UmamiError::LlmRateLimit { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("LLM rate limit exceeded, retry after {retry_after:?} seconds"),
            ),
            UmamiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, UmamiError>;
