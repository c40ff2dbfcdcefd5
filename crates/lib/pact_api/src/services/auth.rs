// @zen-component: AUTH-LoginService
//
//! Authentication service — login/refresh/logout flows composing the core
//! token authority and user queries.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use pact_core::auth::password::verify_password;
use pact_core::auth::queries;
use pact_core::auth::roles::Role;
use pact_core::auth::tokens::TokenAuthority;
use pact_core::models::user::User;

use crate::error::{AppError, AppResult};

/// Access token lifetime surfaced to clients, in seconds.
const ACCESS_EXPIRES_IN_SECS: i64 = 15 * 60;

/// Authenticated user payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Login/refresh response body. The refresh token itself travels only in the
/// scoped cookie, never here.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub user: AuthUser,
}

/// A token response plus the refresh token destined for the cookie.
pub struct LoginOutcome {
    pub response: TokenResponse,
    pub refresh_token: String,
}

fn token_response(user: &User, access_token: String) -> TokenResponse {
    TokenResponse {
        access_token,
        expires_in: ACCESS_EXPIRES_IN_SECS,
        token_type: "Bearer".to_string(),
        user: AuthUser::from(user),
    }
}

/// Authenticate with email + password.
pub async fn login(
    pool: &PgPool,
    authority: &TokenAuthority,
    email: &str,
    password: &str,
) -> AppResult<LoginOutcome> {
    let row = queries::find_user_by_email(pool, email).await?;

    // Same generic error for unknown email and wrong password.
    let found = row.ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;
    if !verify_password(password, &found.password_hash)? {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }
    let user = found.user;

    let access_token = authority.issue_access(user.id, &user.email, user.role)?;
    let grant = authority.issue_refresh(user.id).await?;
    info!(user_id = %user.id, "user logged in");

    Ok(LoginOutcome {
        response: token_response(&user, access_token),
        refresh_token: grant.token,
    })
}

/// Exchange a refresh token for a new token pair (single-use rotation).
pub async fn refresh(
    pool: &PgPool,
    authority: &TokenAuthority,
    refresh_token: &str,
) -> AppResult<LoginOutcome> {
    let grant = authority.rotate(refresh_token).await?;

    let user = queries::get_user(pool, grant.subject)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    let access_token = authority.issue_access(user.id, &user.email, user.role)?;

    Ok(LoginOutcome {
        response: token_response(&user, access_token),
        refresh_token: grant.token,
    })
}

/// Create the first admin account when the user table is still empty.
/// Subsequent calls are no-ops, so the bootstrap is safe to run at startup.
pub async fn ensure_admin(pool: &PgPool, email: &str, password: &str) -> AppResult<bool> {
    if queries::user_count(pool).await? > 0 {
        return Ok(false);
    }
    let password_hash = pact_core::auth::password::hash_password(password)?;
    queries::create_admin(pool, email, &password_hash).await?;
    info!(email, "bootstrap admin created");
    Ok(true)
}

/// Logout — revoke the presented refresh grant. A token that no longer
/// verifies is treated as already logged out.
pub async fn logout(authority: &TokenAuthority, refresh_token: Option<&str>) -> AppResult<()> {
    if let Some(token) = refresh_token {
        if let Ok(claims) = authority.verify_refresh(token).await {
            authority.revoke(&claims.jti).await?;
        }
    }
    Ok(())
}
