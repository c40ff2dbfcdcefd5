//! Sector, service and GTC point models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// A top-level business domain scoping points, services and owners.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sector {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A capability offered within one sector.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sector_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A field partner entity attached to a sector.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GtcPoint {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub sector_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Status of a point's link to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceLinkStatus {
    Enabled,
    Disabled,
    PendingRequest,
}

impl ServiceLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::PendingRequest => "PENDING_REQUEST",
        }
    }
}

impl TryFrom<String> for ServiceLinkStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "ENABLED" => Ok(Self::Enabled),
            "DISABLED" => Ok(Self::Disabled),
            "PENDING_REQUEST" => Ok(Self::PendingRequest),
            other => Err(CoreError::Internal(format!(
                "unknown service link status: {other}"
            ))),
        }
    }
}

/// A point's link to an offered service. Composite-unique on (point, service).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GtcPointService {
    pub id: Uuid,
    pub gtc_point_id: Uuid,
    pub service_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: ServiceLinkStatus,
}
