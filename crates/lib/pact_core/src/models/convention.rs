//! Convention workflow models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::convention::status::ConventionStatus;
use crate::error::CoreError;

/// A document-signing workflow record for one GTC point.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Convention {
    pub id: Uuid,
    pub gtc_point_id: Uuid,
    pub sector_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: ConventionStatus,
    /// Annotation set by the deciding admin.
    pub internal_sales_rep: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a stored convention document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    /// The countersigned convention itself.
    Signed,
    /// Supporting material attached alongside it.
    Annex,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signed => "SIGNED",
            Self::Annex => "ANNEX",
        }
    }
}

impl TryFrom<String> for DocumentKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "SIGNED" => Ok(Self::Signed),
            "ANNEX" => Ok(Self::Annex),
            other => Err(CoreError::Internal(format!(
                "unknown document kind: {other}"
            ))),
        }
    }
}

/// A stored convention document. Immutable once created; rows disappear only
/// when the whole convention is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConventionDocument {
    pub id: Uuid,
    pub convention_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: DocumentKind,
    pub stored_name: String,
    pub relative_path: String,
    pub mime: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}
