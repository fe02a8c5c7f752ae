//! Error types for Fedgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Actor domain is on the local block list (403)
    #[error("Domain blocked")]
    DomainBlocked,

    /// Activity type outside the supported set (422)
    #[error("Unsupported activity type: {0}")]
    UnsupportedActivityType(String),

    /// Interaction policy rejection (403)
    #[error("Interaction not permitted")]
    NotPermitted,

    /// Message decryption failed (500)
    ///
    /// Deliberately carries no detail: wrong key and tampered
    /// ciphertext must be indistinguishable to callers.
    #[error("Decryption failed")]
    Decryption,

    /// Endpoint discovery failed for a domain (502)
    #[error("Discovery failed for {0}")]
    DiscoveryFailed(String),

    /// Activity delivery failed after retry exhaustion (502)
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                "invalid_signature",
            ),
            AppError::DomainBlocked => {
                (StatusCode::FORBIDDEN, self.to_string(), "domain_blocked")
            }
            AppError::UnsupportedActivityType(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                self.to_string(),
                "unsupported_activity_type",
            ),
            AppError::NotPermitted => {
                (StatusCode::FORBIDDEN, self.to_string(), "not_permitted")
            }
            AppError::Decryption => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                "decryption",
            ),
            AppError::DiscoveryFailed(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string(), "discovery")
            }
            AppError::DeliveryFailed(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string(), "delivery")
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
            ),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
