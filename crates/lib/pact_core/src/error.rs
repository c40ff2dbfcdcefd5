//! Domain error taxonomy.
//!
//! One closed enum shared by every core module. The HTTP layer maps these to
//! statuses; token-verification variants are collapsed there into a single
//! generic 401 so callers cannot distinguish expired from revoked credentials.

use thiserror::Error;

/// Convenience alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or rejected input. No side effects have occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Role or ownership mismatch.
    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal state transition or duplicate unique key.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed token or bad signature.
    #[error("Invalid token")]
    InvalidToken,

    /// Token (or the record backing it) is past its expiry.
    #[error("Expired token")]
    ExpiredToken,

    /// The token verified cryptographically but its grant is gone.
    #[error("Revoked token")]
    RevokedToken,

    /// A grant token was presented for a purpose it was not issued for.
    #[error("Invalid grant kind: expected {expected}, got {actual}")]
    InvalidGrantKind { expected: String, actual: String },

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True for any token-verification failure.
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidToken
                | CoreError::ExpiredToken
                | CoreError::RevokedToken
                | CoreError::InvalidGrantKind { .. }
        )
    }
}
