// @zen-component: AUTH-TokenCodec
//
//! JWT encoding and verification for access and grant tokens.
//!
//! Two claim shapes: `AccessClaims` for short-lived bearer credentials, and
//! `GrantClaims` for refresh/invite/registration tokens whose `jti` points at
//! a live grant in the session store. Cryptographic validity of a grant token
//! is necessary but not sufficient; callers must also check the store.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::error::CoreError;

/// Claims embedded in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// User email.
    pub email: String,
    /// User role.
    pub role: Role,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// What a grant token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    Refresh,
    Invite,
    Registration,
}

impl GrantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Invite => "invite",
            Self::Registration => "registration",
        }
    }
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in refresh/invite/registration tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantClaims {
    /// Subject — user ID, or onboarding ID for registration grants.
    pub sub: Uuid,
    /// Grant identifier; key of the backing session-store record.
    pub jti: String,
    /// Purpose tag.
    pub kind: GrantKind,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Generate a signed access token (HS256).
pub fn generate_access_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, CoreError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| CoreError::Internal(format!("jwt encode: {e}")))
}

/// Verify an access token. Any failure (malformed, expired, bad signature)
/// is reported as `InvalidToken`.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<AccessClaims, CoreError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::default();
    decode::<AccessClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| CoreError::InvalidToken)
}

/// Generate a signed grant token (HS256) embedding the grant identifier.
pub fn generate_grant_token(
    subject: Uuid,
    jti: &str,
    kind: GrantKind,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, CoreError> {
    let now = Utc::now();
    let claims = GrantClaims {
        sub: subject,
        jti: jti.to_string(),
        kind,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| CoreError::Internal(format!("jwt encode: {e}")))
}

/// Decode a grant token, distinguishing expiry from other failures so callers
/// can report `ExpiredToken` without consulting the store.
pub fn decode_grant_token(token: &str, secret: &[u8]) -> Result<GrantClaims, CoreError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::default();
    match decode::<GrantClaims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(CoreError::ExpiredToken),
        Err(_) => Err(CoreError::InvalidToken),
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pact")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn access_token_round_trip() {
        let id = Uuid::new_v4();
        let token =
            generate_access_token(id, "a@b.it", Role::Admin, Duration::minutes(15), SECRET)
                .unwrap();
        let claims = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@b.it");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn tampered_signature_rejected() {
        let token = generate_access_token(
            Uuid::new_v4(),
            "a@b.it",
            Role::GtcPoint,
            Duration::minutes(15),
            SECRET,
        )
        .unwrap();
        // Flip one byte in the signature segment.
        let mut bytes = token.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(matches!(
            verify_access_token(&tampered, SECRET),
            Err(CoreError::InvalidToken)
        ));
    }

    #[test]
    fn expired_access_token_is_invalid() {
        let token = generate_access_token(
            Uuid::new_v4(),
            "a@b.it",
            Role::Admin,
            Duration::seconds(-120),
            SECRET,
        )
        .unwrap();
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(CoreError::InvalidToken)
        ));
    }

    #[test]
    fn expired_grant_token_reports_expiry() {
        let token = generate_grant_token(
            Uuid::new_v4(),
            "jti-1",
            GrantKind::Refresh,
            Duration::seconds(-120),
            SECRET,
        )
        .unwrap();
        assert!(matches!(
            decode_grant_token(&token, SECRET),
            Err(CoreError::ExpiredToken)
        ));
    }

    #[test]
    fn grant_token_carries_kind_and_jti() {
        let token = generate_grant_token(
            Uuid::new_v4(),
            "jti-2",
            GrantKind::Invite,
            Duration::days(7),
            SECRET,
        )
        .unwrap();
        let claims = decode_grant_token(&token, SECRET).unwrap();
        assert_eq!(claims.jti, "jti-2");
        assert_eq!(claims.kind, GrantKind::Invite);
    }
}
