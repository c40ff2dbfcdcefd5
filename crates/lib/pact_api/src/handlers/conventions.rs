//! Convention workflow handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use pact_core::convention::{self, Decision};
use pact_core::files::FileUpload;
use pact_core::models::convention::{Convention, ConventionDocument};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::handlers::load_actor;
use crate::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct CreateConventionRequest {
    pub gtc_point_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
}

/// `POST /conventions` — open a convention in NEW.
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<CreateConventionRequest>,
) -> AppResult<Json<Convention>> {
    let actor = load_actor(&state, &auth).await?;
    let convention =
        convention::create(&state.pool, &actor, body.gtc_point_id, body.sector_id).await?;
    Ok(Json(convention))
}

/// `GET /conventions/{id}` — fetch one convention.
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Convention>> {
    let _ = load_actor(&state, &auth).await?;
    let convention = convention::queries::get_convention(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("convention {id}")))?;
    Ok(Json(convention))
}

/// `POST /conventions/{id}/document` — upload the signed PDF as the raw
/// request body. MIME comes from `Content-Type`, the original file name from
/// `X-File-Name`.
pub async fn upload_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ConventionDocument>> {
    let actor = load_actor(&state, &auth).await?;
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let original_name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("document.pdf")
        .to_string();

    let document = convention::upload(
        &state.pool,
        state.files.as_ref(),
        &state.dispatcher,
        &actor,
        id,
        FileUpload {
            bytes: body.to_vec(),
            mime,
            original_name,
        },
    )
    .await?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Approve,
    Decline,
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub action: DecisionAction,
    pub internal_sales_rep: Option<String>,
}

/// `POST /conventions/{id}/decision` — admin approval or decline.
pub async fn decide_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<DecideRequest>,
) -> AppResult<Json<Convention>> {
    let actor = load_actor(&state, &auth).await?;
    let decision = match body.action {
        DecisionAction::Approve => Decision::Approve,
        DecisionAction::Decline => Decision::Decline,
    };
    let convention = convention::decide(
        &state.pool,
        &state.dispatcher,
        &actor,
        id,
        decision,
        body.internal_sales_rep,
    )
    .await?;
    Ok(Json(convention))
}

/// `DELETE /conventions/{id}` — delete a convention still in NEW.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let actor = load_actor(&state, &auth).await?;
    convention::remove(&state.pool, state.files.as_ref(), &actor, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
