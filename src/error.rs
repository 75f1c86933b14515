//! Error types for Agora
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Expected outcomes such as "already liked" or "no such post" are not
//! errors: repositories report them as `bool` or `Option` values.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
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

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Actor and target are the same user (400)
    #[error("Cannot follow yourself")]
    SelfReference,

    /// Request body is not the expected JSON (400)
    #[error("Invalid request body: {0}")]
    JsonRejection(#[from] JsonRejection),

    /// Path parameter failed to parse (400)
    #[error("Invalid path parameter: {0}")]
    PathRejection(#[from] PathRejection),

    /// Query string failed to parse (400)
    #[error("Invalid query string: {0}")]
    QueryRejection(#[from] QueryRejection),

    /// Unique field already taken (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/decryption error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::SelfReference => (StatusCode::BAD_REQUEST, "self_reference"),
            AppError::JsonRejection(_)
            | AppError::PathRejection(_)
            | AppError::QueryRejection(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Encryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.classify();
        let error_message = match &self {
            AppError::Validation(msg) | AppError::Conflict(msg) | AppError::Config(msg) => {
                msg.clone()
            }
            AppError::Encryption(msg) => msg.clone(),
            AppError::JsonRejection(rejection) => rejection.body_text(),
            AppError::PathRejection(rejection) => rejection.body_text(),
            AppError::QueryRejection(rejection) => rejection.body_text(),
            AppError::Database(error) => {
                tracing::error!(%error, "Database error while handling request");
                "Database error".to_string()
            }
            AppError::Internal(error) => {
                tracing::error!(error = %error, "Internal error while handling request");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn self_reference_maps_to_bad_request() {
        let response = AppError::SelfReference.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Cannot follow yourself");
    }

    #[tokio::test]
    async fn validation_message_is_returned_verbatim() {
        let response = AppError::Validation("Content is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Content is required");
    }

    #[tokio::test]
    async fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Database error");
    }

    #[test]
    fn conflict_maps_to_409() {
        let (status, label) = AppError::Conflict("taken".to_string()).classify();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(label, "conflict");
    }
}
