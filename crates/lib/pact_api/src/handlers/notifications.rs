//! Notification handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use pact_core::models::notification::Notification;
use pact_core::notify::queries;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// Page size for the notification list.
const LIST_LIMIT: i64 = 50;

/// `GET /notifications` — the caller's notifications, newest first.
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<Notification>>> {
    let rows = queries::list_for_user(&state.pool, auth.0.sub, LIST_LIMIT).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// `GET /notifications/unread-count` — the caller's unread badge value.
pub async fn unread_count_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread = queries::unread_count(&state.pool, auth.0.sub).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// `POST /notifications/{id}/read` — mark one of the caller's notifications
/// read.
pub async fn mark_read_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let marked = queries::mark_read(&state.pool, auth.0.sub, id).await?;
    if !marked {
        return Err(AppError::NotFound(format!("notification {id}")));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
