//! User domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::roles::Role;

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Set for SECTOR_OWNER users.
    pub sector_id: Option<Uuid>,
    /// Set for GTC_POINT users.
    pub gtc_point_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller of a core operation, as resolved from an access
/// token plus the user row. Carries the affiliation needed for ownership
/// checks without re-fetching the user.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub sector_id: Option<Uuid>,
    pub gtc_point_id: Option<Uuid>,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            sector_id: user.sector_id,
            gtc_point_id: user.gtc_point_id,
        }
    }
}
