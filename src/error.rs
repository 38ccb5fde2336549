use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::templates::Mode;

// Errors the orchestrator surfaces to callers. Everything else degrades.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("mode must be one of: {}", Mode::names().join(", "))]
    InvalidMode(String),
}

// Failures talking to the generation backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no healthy backend available")]
    Unavailable,

    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

// Failures talking to the shared store (result cache + history)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one backend required")]
    NoBackends,
}

// One failing field in a rejected request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
}

impl FieldError {
    pub fn new(field: &str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec![field.to_string()],
            msg: msg.into(),
        }
    }
}

// Errors mapped onto HTTP responses by the handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API key")]
    Unauthorized,

    #[error("request validation failed")]
    Validation(Vec<FieldError>),

    #[error("invalid request body: {0}")]
    Body(String),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

// Unparseable or mistyped JSON is a validation failure like any other
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        let (status, detail) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, None),
            ApiError::Validation(fields) => (StatusCode::UNPROCESSABLE_ENTITY, Some(fields)),
            ApiError::Body(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            ApiError::Generate(GenerateError::InvalidMode(_)) => (StatusCode::BAD_REQUEST, None),
        };
        (status, Json(ErrorBody { error, detail })).into_response()
    }
}
