use thiserror::Error;

// Import Axum types for HTTP response conversion
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// The custom error type for the application.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from the sqlx library.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Malformed user or request input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A not found error (resource does not exist).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conflict error (stale session version, duplicate record).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Webhook signature or verify token rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An external collaborator (sender, locator, extractor, renderer) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP call failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// A type alias for `Result<T, Error>` to simplify function signatures.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Sqlx(_) => "INTERNAL_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Collaborator(_) => "COLLABORATOR_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Http(_) => "COLLABORATOR_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::Collaborator(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Sqlx(_) | Error::Internal(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convert custom Error to HTTP response
///
/// Internal details (database, configuration) are not echoed to the caller.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            Error::Sqlx(_) => "Database error".to_string(),
            Error::Config(_) => "Configuration error".to_string(),
            Error::Http(_) => "Upstream request failed".to_string(),
            Error::Validation(msg)
            | Error::NotFound(msg)
            | Error::Conflict(msg)
            | Error::Unauthorized(msg)
            | Error::Collaborator(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::Serialization(e) => e.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "code": self.code(),
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(Error::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(Error::Collaborator("x".into()).code(), "COLLABORATOR_ERROR");
    }

    #[test]
    fn test_error_status_mapping() {
        let response = Error::Unauthorized("bad signature".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = Error::Collaborator("sender down".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
