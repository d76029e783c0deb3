//! Uniform HTTP error handling: a typed `AppError` per failure
//! kind, mapped to the `{ error, code, details }` envelope and HTTP status.
//! This is the only place error kind is converted to HTTP status — adapters
//! and `db::queries` surface `anyhow::Error`/typed errors instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("rate limited")]
    RateLimited,
    #[error("{message}")]
    UpstreamInvalid { message: String, field: Option<String> },
    #[error("upstream timeout")]
    UpstreamTimeout,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::UpstreamInvalid { .. } => "UPSTREAM_INVALID",
            AppError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamInvalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a failed adapter call (geocoder or router) for the given
    /// request field. A geocode miss on any of the three addresses fails
    /// the whole request, naming which field caused it.
    pub fn upstream(err: anyhow::Error, field: &str) -> Self {
        AppError::UpstreamInvalid {
            message: err.to_string(),
            field: Some(field.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    details: serde_json::Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AppError::UpstreamInvalid { field: Some(f), .. } => json!({ "field": f }),
            _ => json!({}),
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
