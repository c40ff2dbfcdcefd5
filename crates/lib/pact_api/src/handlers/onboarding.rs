//! Onboarding workflow handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pact_core::files::FileUpload;
use pact_core::models::onboarding::{PointOnboarding, SubmissionFields};
use pact_core::models::user::User;
use pact_core::onboarding;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::handlers::load_actor;
use crate::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub sector_id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
}

/// `POST /onboardings` — admin creates an onboarding link.
pub async fn create_link_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateLinkRequest>,
) -> AppResult<Json<PointOnboarding>> {
    let actor = load_actor(&state, &auth).await?;
    let onboarding = onboarding::create_link(
        &state.pool,
        &state.dispatcher,
        &actor,
        body.sector_id,
        &body.email,
        &body.name,
        &body.service_ids,
        &state.config.public_base_url,
    )
    .await?;
    Ok(Json(onboarding))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub fields: SubmissionFields,
    pub service_ids: Option<Vec<Uuid>>,
    /// Signature image, base64-encoded.
    pub signature: Option<String>,
    pub signature_mime: Option<String>,
}

/// `POST /onboarding/{token}/submit` — applicant submission (public route,
/// gated by the opaque link token).
pub async fn submit_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<SubmitRequest>,
) -> AppResult<Json<PointOnboarding>> {
    let signature = match &body.signature {
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|_| AppError::Validation("signature is not valid base64".into()))?;
            let stored = state
                .files
                .put(&FileUpload {
                    bytes,
                    mime: body
                        .signature_mime
                        .clone()
                        .unwrap_or_else(|| "image/png".into()),
                    original_name: "signature.png".into(),
                })
                .await?;
            Some(stored)
        }
        None => None,
    };

    let onboarding = onboarding::submit(
        &state.pool,
        &state.dispatcher,
        &token,
        &body.fields,
        body.service_ids.as_deref(),
        signature.as_ref(),
        &state.config.public_base_url,
    )
    .await?;
    Ok(Json(onboarding))
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub onboarding: PointOnboarding,
    pub gtc_point_id: Uuid,
    pub enabled_service_ids: Vec<Uuid>,
    pub dropped_service_ids: Vec<Uuid>,
}

/// `POST /onboardings/{id}/approve` — admin approval.
pub async fn approve_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApprovalResponse>> {
    let actor = load_actor(&state, &auth).await?;
    let outcome = onboarding::approve(
        &state.pool,
        &state.dispatcher,
        &state.authority,
        &actor,
        id,
        &state.config.public_base_url,
    )
    .await?;
    Ok(Json(ApprovalResponse {
        onboarding: outcome.onboarding,
        gtc_point_id: outcome.gtc_point_id,
        enabled_service_ids: outcome.enabled_service_ids,
        dropped_service_ids: outcome.dropped_service_ids,
    }))
}

/// `POST /onboardings/{id}/decline` — admin decline.
pub async fn decline_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PointOnboarding>> {
    let actor = load_actor(&state, &auth).await?;
    let onboarding =
        onboarding::decline(&state.pool, &state.dispatcher, &actor, id).await?;
    Ok(Json(onboarding))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub password: String,
}

/// `POST /register/{token}` — applicant redeems the registration token
/// (public route).
pub async fn register_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<User>> {
    let user = onboarding::complete_registration(
        &state.pool,
        &state.dispatcher,
        &state.authority,
        &token,
        &body.password,
    )
    .await?;
    Ok(Json(user))
}
