//! Error types for authgate

use std::io;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Result type alias for authgate
pub type Result<T> = std::result::Result<T, Error>;

/// authgate errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unauthenticated access to a protected resource
    #[error("{0}")]
    Authentication(String),

    /// Malformed input
    #[error("{message}")]
    Validation {
        /// Human-readable summary
        message: String,
        /// Optional structured detail (per-field errors)
        details: Option<Value>,
    },

    /// Request throttled by the rate limiter
    #[error("{}", messages::RATE_LIMIT_EXCEEDED)]
    RateLimited {
        /// Seconds until the current window resets
        retry_after: u64,
    },

    /// Error reported by the identity provider
    #[error("Identity provider error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider error code, when one was sent
        code: Option<String>,
        /// Provider error message
        message: String,
        /// User the error refers to, when the provider names one
        user_id: Option<String>,
    },

    /// Session token could not be created
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an authentication error with the default message
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Authentication(messages::UNAUTHORIZED.to_string())
    }

    /// Create a validation error without details
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status this error is rendered with
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => codes::AUTHENTICATION_ERROR,
            Self::Validation { .. } => codes::VALIDATION_ERROR,
            Self::RateLimited { .. } => codes::RATE_LIMIT_EXCEEDED,
            Self::Provider { .. } => codes::WORKOS_ERROR,
            _ => codes::INTERNAL_ERROR,
        }
    }

    /// Whether the message is safe to show to clients in production
    #[must_use]
    pub fn is_client_safe(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::Validation { .. } | Self::RateLimited { .. }
        )
    }
}

/// Error codes carried in the `error.code` field of JSON responses
pub mod codes {
    /// 401 - no valid session
    pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";
    /// 400 - malformed input
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// 429 - throttled
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    /// Identity provider failure
    pub const WORKOS_ERROR: &str = "WORKOS_ERROR";
    /// 400 - provider redirected back with an error
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    /// 404 - unknown route
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// 500 - anything unexpected
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Client-facing messages
pub mod messages {
    /// Default 401 message
    pub const UNAUTHORIZED: &str = "You are not authorized to access this resource";
    /// Replacement for redacted messages
    pub const INTERNAL_ERROR: &str = "An unexpected error occurred. Please try again later.";
    /// Default 429 message
    pub const RATE_LIMIT_EXCEEDED: &str = "Too many requests. Please try again later.";
}

/// An [`Error`] on its way out of a handler.
///
/// Carries whether internal messages must be redacted, which depends on the
/// deployment environment rather than on the error itself.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    redact: bool,
}

impl ApiError {
    /// Wrap an error for rendering
    #[must_use]
    pub fn new(error: Error, redact: bool) -> Self {
        Self { error, redact }
    }

    /// The wrapped error
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// JSON body for this error
    #[must_use]
    pub fn body(&self) -> Value {
        let message = if self.redact && !self.error.is_client_safe() {
            messages::INTERNAL_ERROR.to_string()
        } else {
            self.error.to_string()
        };

        let mut error = Map::new();
        error.insert("message".to_string(), Value::String(message));
        error.insert("code".to_string(), Value::String(self.error.code().to_string()));

        match &self.error {
            Error::Validation {
                details: Some(details),
                ..
            } => {
                error.insert("details".to_string(), details.clone());
            }
            Error::RateLimited { retry_after } => {
                error.insert("retryAfter".to_string(), json!(retry_after));
            }
            Error::Provider {
                code: Some(code), ..
            } if !self.redact => {
                error.insert("details".to_string(), json!({ "providerCode": code }));
            }
            _ => {}
        }

        json!({ "error": error })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_client_safe() {
            tracing::debug!(code = self.error.code(), error = %self.error, "Request failed");
        } else {
            tracing::error!(code = self.error.code(), error = ?self.error, "Request failed");
        }

        let status = self.error.status_code();
        let body = self.body();
        let mut response = (status, Json(body)).into_response();

        if let Error::RateLimited { retry_after } = self.error
            && let Ok(value) = HeaderValue::try_from(retry_after.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}
