//! Error types for the proxy
//!
//! Provides unified request error handling using thiserror. Cache failures
//! never appear here: the cache adapter absorbs them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::upstream::UpstreamError;

// == App Error Enum ==
/// Failure of a single request.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller supplied missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Provider call failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Provider output did not match the expected structure
    #[error("{0}")]
    Parse(String),

    /// Internal server error
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Parse(_) => "parse_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(UpstreamError::MissingCredential) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(UpstreamError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream(_) | AppError::Parse(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.kind(), self.to_string()));

        (self.status(), body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, AppError>;
