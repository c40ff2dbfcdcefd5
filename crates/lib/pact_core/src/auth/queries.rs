//! Auth-related database queries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::user::User;

const USER_COLUMNS: &str =
    "id, email, name, role, sector_id, gtc_point_id, created_at";

/// A user row joined with its password hash, for credential checks.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithPassword {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Fetch a user and password hash by email.
pub async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> CoreResult<Option<UserWithPassword>> {
    let row = sqlx::query_as::<_, UserWithPassword>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> CoreResult<Option<User>> {
    let row = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Check whether an email is already registered.
pub async fn email_exists(pool: &PgPool, email: &str) -> CoreResult<bool> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Count total users.
pub async fn user_count(pool: &PgPool) -> CoreResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Create an admin user.
pub async fn create_admin(pool: &PgPool, email: &str, password_hash: &str) -> CoreResult<User> {
    let row = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, 'ADMIN') \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
