//! # pact_api
//!
//! HTTP API library for Pact.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use pact_core::auth::tokens::TokenAuthority;
use pact_core::files::FileStore;
use pact_core::notify::Dispatcher;

use crate::config::ApiConfig;
use crate::handlers::{auth, conventions, notifications, onboarding};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Token issuance and verification.
    pub authority: TokenAuthority,
    /// Notification fan-out.
    pub dispatcher: Dispatcher,
    /// Blob storage.
    pub files: Arc<dyn FileStore>,
}

/// Run embedded database migrations.
///
/// Delegates to `pact_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    pact_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required); the onboarding routes are gated by
    // their single-use link tokens instead.
    let public = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/onboarding/{token}/submit",
            post(onboarding::submit_handler),
        )
        .route("/register/{token}", post(onboarding::register_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/conventions", post(conventions::create_handler))
        .route("/conventions/{id}", get(conventions::get_handler))
        .route("/conventions/{id}", delete(conventions::delete_handler))
        .route(
            "/conventions/{id}/document",
            post(conventions::upload_handler),
        )
        .route(
            "/conventions/{id}/decision",
            post(conventions::decide_handler),
        )
        .route("/onboardings", post(onboarding::create_link_handler))
        .route(
            "/onboardings/{id}/approve",
            post(onboarding::approve_handler),
        )
        .route(
            "/onboardings/{id}/decline",
            post(onboarding::decline_handler),
        )
        .route("/notifications", get(notifications::list_handler))
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count_handler),
        )
        .route(
            "/notifications/{id}/read",
            post(notifications::mark_read_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
