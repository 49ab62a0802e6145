//! Ward service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic for the
//! internal-failure variants to avoid leaking details. Actual errors are
//! logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Ward service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Validation, VerificationFailed: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - IllegalTransition: 409 Conflict
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum WardError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment signature verification failed")]
    VerificationFailed,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl WardError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            WardError::Validation(_) | WardError::VerificationFailed => 400,
            WardError::Unauthorized(_) => 401,
            WardError::Forbidden(_) => 403,
            WardError::NotFound(_) => 404,
            WardError::IllegalTransition { .. } => 409,
            WardError::Database(_) | WardError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for WardError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            WardError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                reason.clone(),
            ),
            WardError::VerificationFailed => {
                // The mismatch detail stays server-side.
                tracing::warn!(target: "ward.payments", "Payment signature verification failed");
                (
                    StatusCode::BAD_REQUEST,
                    "INVALID_SIGNATURE",
                    "Payment verification failed".to_string(),
                )
            }
            WardError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.clone())
            }
            WardError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            WardError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            WardError::IllegalTransition { from, to } => (
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
                format!("Cannot transition appointment from {} to {}", from, to),
            ),
            WardError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "ward.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            WardError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Ward realm=\"ward-api\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to WardError
impl From<sqlx::Error> for WardError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WardError::NotFound("Record not found".to_string()),
            other => WardError::Database(other.to_string()),
        }
    }
}

/// Convert fabric mailbox failures to WardError
impl From<event_fabric::FabricError> for WardError {
    fn from(err: event_fabric::FabricError) -> Self {
        tracing::error!(target: "ward.fabric", error = %err, "Relay command failed");
        WardError::Internal
    }
}
