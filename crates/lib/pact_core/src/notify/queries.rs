//! Notification rows and recipient directory queries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::notification::{Notification, NotificationKind};
use crate::uuid::uuidv7;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, subject, content, read, created_at";

/// Insert one unread notification, returning the created row.
pub async fn insert_notification(
    pool: &PgPool,
    user_id: Uuid,
    kind: NotificationKind,
    subject: &str,
    content: &str,
) -> CoreResult<Notification> {
    let row = sqlx::query_as::<_, Notification>(&format!(
        "INSERT INTO notifications (id, user_id, kind, subject, content) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(uuidv7())
    .bind(user_id)
    .bind(kind.as_str())
    .bind(subject)
    .bind(content)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Count a user's unread notifications.
pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> CoreResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = false",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// List a user's notifications, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> CoreResult<Vec<Notification>> {
    let rows = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark one of the user's notifications read. Returns false when the row does
/// not exist or belongs to someone else.
pub async fn mark_read(pool: &PgPool, user_id: Uuid, notification_id: Uuid) -> CoreResult<bool> {
    let result = sqlx::query(
        "UPDATE notifications SET read = true WHERE id = $1 AND user_id = $2",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Registered email address of a user.
pub async fn user_email(pool: &PgPool, user_id: Uuid) -> CoreResult<Option<String>> {
    let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(email)
}

// ---------------------------------------------------------------------------
// Recipient directory
// ---------------------------------------------------------------------------

/// All admin user IDs.
pub async fn admin_user_ids(pool: &PgPool) -> CoreResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE role = 'ADMIN'")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Owners of one sector.
pub async fn sector_owner_ids(pool: &PgPool, sector_id: Uuid) -> CoreResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM users WHERE role = 'SECTOR_OWNER' AND sector_id = $1",
    )
    .bind(sector_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Users attached to one GTC point.
pub async fn point_user_ids(pool: &PgPool, gtc_point_id: Uuid) -> CoreResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM users WHERE role = 'GTC_POINT' AND gtc_point_id = $1",
    )
    .bind(gtc_point_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}
