//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use pact_core::error::CoreError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Wire shape for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        // Token failures deliberately collapse into one opaque message so the
        // response does not reveal whether a credential was expired, revoked
        // or malformed.
        if e.is_token_failure() {
            return AppError::Unauthorized("Invalid or expired token".into());
        }
        match e {
            CoreError::Validation(m) => AppError::Validation(m),
            CoreError::Authorization(m) => AppError::Forbidden(m),
            CoreError::NotFound(m) => AppError::NotFound(m),
            CoreError::Conflict(m) => AppError::Conflict(m),
            CoreError::Db(e) => AppError::from(e),
            CoreError::Internal(m) => AppError::Internal(m),
            // Covered by is_token_failure above.
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_are_indistinguishable() {
        for err in [
            CoreError::InvalidToken,
            CoreError::ExpiredToken,
            CoreError::RevokedToken,
            CoreError::InvalidGrantKind {
                expected: "refresh".into(),
                actual: "invite".into(),
            },
        ] {
            match AppError::from(err) {
                AppError::Unauthorized(m) => assert_eq!(m, "Invalid or expired token"),
                other => panic!("expected Unauthorized, got {other:?}"),
            }
        }
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert!(matches!(
            AppError::from(CoreError::Conflict("x".into())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(CoreError::Authorization("x".into())),
            AppError::Forbidden(_)
        ));
    }
}
