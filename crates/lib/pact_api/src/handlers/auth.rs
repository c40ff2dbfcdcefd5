// @zen-component: AUTH-Endpoints
//
//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::auth::{self, TokenResponse};
use crate::services::cookies;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login` — authenticate with email + password. The refresh token
/// is set as a path-scoped httpOnly cookie.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let outcome = auth::login(&state.pool, &state.authority, &body.email, &body.password).await?;
    let jar = jar.add(cookies::refresh_cookie(&outcome.refresh_token));
    Ok((jar, Json(outcome.response)))
}

/// `POST /auth/refresh` — rotate the refresh cookie into a new token pair.
///
/// On any failure the cookie is cleared, so the client falls back to a fresh
/// login instead of replaying a dead token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), (CookieJar, AppError)> {
    let Some(token) = jar.get(cookies::REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        let jar = jar.add(cookies::clear_refresh_cookie());
        return Err((jar, AppError::Unauthorized("Invalid or expired token".into())));
    };

    match auth::refresh(&state.pool, &state.authority, &token).await {
        Ok(outcome) => {
            let jar = jar.add(cookies::refresh_cookie(&outcome.refresh_token));
            Ok((jar, Json(outcome.response)))
        }
        Err(e) => {
            let jar = jar.add(cookies::clear_refresh_cookie());
            Err((jar, e))
        }
    }
}

/// `POST /auth/logout` — revoke the refresh grant and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<serde_json::Value>)> {
    let token = jar.get(cookies::REFRESH_COOKIE).map(|c| c.value().to_string());
    auth::logout(&state.authority, token.as_deref()).await?;
    let jar = jar.add(cookies::clear_refresh_cookie());
    Ok((jar, Json(serde_json::json!({ "success": true }))))
}
