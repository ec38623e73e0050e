use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use proteus_core::CrawlError;

use crate::dto::ErrorResponse;

/// Errors a handler can surface before any per-query reporting exists.
pub enum ApiError {
    /// Request rejected before any crawling started.
    Validation(String),
    /// Crawl-layer refusal, e.g. the whole pool is quarantined.
    Crawl(CrawlError),
}

impl From<CrawlError> for ApiError {
    fn from(err: CrawlError) -> Self {
        Self::Crawl(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, "validation_error", message),
            ApiError::Crawl(err) => {
                let (status, error_type) = match &err {
                    CrawlError::PoolExhausted => {
                        (StatusCode::SERVICE_UNAVAILABLE, "pool_exhausted")
                    }
                    CrawlError::CredentialsExhausted => {
                        (StatusCode::SERVICE_UNAVAILABLE, "credentials_exhausted")
                    }
                    CrawlError::Timeout(_) | CrawlError::DeadlineExceeded(_) => {
                        (StatusCode::GATEWAY_TIMEOUT, "timeout")
                    }
                    CrawlError::ConfigError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, error_type, err.to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
