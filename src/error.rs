//! Unified error types for recorder-vault
use crate::{
    crypto::password::PasswordError,
    session::{refresh::RefreshError, signer::TokenError},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-level error.
///
/// Only four kinds are visible to callers: validation, conflict, unauthorized
/// and an opaque server error. Everything else carries internal context for
/// the logs and is collapsed before the response is built.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad credentials, invalid or expired token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Database errors
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact storage errors with path context
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            AppError::Unauthorized(reason) => {
                // Every rejection looks the same from outside.
                tracing::debug!(reason = %reason, "request rejected as unauthorized");
                (
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized",
                    "Invalid credentials".to_string(),
                )
            }
            AppError::Persistence(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", e))
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => AppError::Internal(format!("Token signing failed: {}", msg)),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<RefreshError> for AppError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::InvalidToken | RefreshError::TokenExpired => {
                AppError::Unauthorized(e.to_string())
            }
            RefreshError::ExpiryOutOfRange => AppError::Internal(e.to_string()),
            RefreshError::Persistence(db) => AppError::Persistence(db),
            RefreshError::Signer(inner) => inner.into(),
        }
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
