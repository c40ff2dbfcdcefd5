//! Onboarding workflow models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::onboarding::status::OnboardingStatus;

/// A prospective point's onboarding record.
///
/// The opaque onboarding token itself is never loaded into this struct; only
/// its expiry is. Lookups go through the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointOnboarding {
    pub id: Uuid,
    pub sector_id: Uuid,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub status: OnboardingStatus,
    pub phone: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    /// Relative path of the uploaded signature image, if any.
    pub signature_path: Option<String>,
    pub onboarding_expires_at: Option<DateTime<Utc>>,
    /// Grant identifier of the registration token issued at approval.
    pub registration_jti: Option<String>,
    pub registration_expires_at: Option<DateTime<Utc>>,
    /// The GTC point materialized at approval.
    pub gtc_point_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Applicant-provided fields captured at submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionFields {
    pub phone: Option<String>,
    pub vat_number: Option<String>,
    pub address: Option<String>,
}
