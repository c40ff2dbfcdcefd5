//! Request handlers. Thin: validate transport, delegate to core, map errors.

pub mod auth;
pub mod conventions;
pub mod notifications;
pub mod onboarding;

use pact_core::auth::queries;
use pact_core::models::user::Actor;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// Resolve the authenticated caller into a full `Actor` (role + affiliation).
pub async fn load_actor(state: &AppState, auth: &AuthenticatedUser) -> AppResult<Actor> {
    let user = queries::get_user(&state.pool, auth.0.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;
    Ok(Actor::from(&user))
}
