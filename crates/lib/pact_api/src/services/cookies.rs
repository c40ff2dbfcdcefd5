//! Cookie service — the refresh token's scoped httpOnly cookie.
//!
//! The refresh token never travels in a response body; it lives in a cookie
//! whose path restricts it to the refresh endpoint.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "pact_refresh";

/// Path the refresh cookie is scoped to.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Refresh token lifetime in days, matching the grant TTL.
const REFRESH_COOKIE_DAYS: i64 = 7;

/// Build the httpOnly refresh cookie, scoped to the refresh path.
pub fn refresh_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(false) // TODO: set true in production
        .same_site(SameSite::Lax)
        .path(REFRESH_PATH.to_string())
        .max_age(Duration::days(REFRESH_COOKIE_DAYS))
        .build()
}

/// Build an expired cookie to clear the refresh token.
pub fn clear_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .path(REFRESH_PATH.to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_scoped_and_http_only() {
        let cookie = refresh_cookie("tok");
        assert_eq!(cookie.path(), Some(REFRESH_PATH));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.value(), "tok");
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie();
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert!(cookie.value().is_empty());
    }
}
