//! Notification models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Business event kinds a notification can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ConventionUploaded,
    ConventionApproved,
    ConventionDeclined,
    OnboardingSubmitted,
    OnboardingApproved,
    OnboardingDeclined,
    OnboardingCompleted,
    Welcome,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConventionUploaded => "CONVENTION_UPLOADED",
            Self::ConventionApproved => "CONVENTION_APPROVED",
            Self::ConventionDeclined => "CONVENTION_DECLINED",
            Self::OnboardingSubmitted => "ONBOARDING_SUBMITTED",
            Self::OnboardingApproved => "ONBOARDING_APPROVED",
            Self::OnboardingDeclined => "ONBOARDING_DECLINED",
            Self::OnboardingCompleted => "ONBOARDING_COMPLETED",
            Self::Welcome => "WELCOME",
        }
    }
}

impl TryFrom<String> for NotificationKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "CONVENTION_UPLOADED" => Ok(Self::ConventionUploaded),
            "CONVENTION_APPROVED" => Ok(Self::ConventionApproved),
            "CONVENTION_DECLINED" => Ok(Self::ConventionDeclined),
            "ONBOARDING_SUBMITTED" => Ok(Self::OnboardingSubmitted),
            "ONBOARDING_APPROVED" => Ok(Self::OnboardingApproved),
            "ONBOARDING_DECLINED" => Ok(Self::OnboardingDeclined),
            "ONBOARDING_COMPLETED" => Ok(Self::OnboardingCompleted),
            "WELCOME" => Ok(Self::Welcome),
            other => Err(CoreError::Internal(format!(
                "unknown notification kind: {other}"
            ))),
        }
    }
}

/// One persisted notification for one recipient. Created unread; the only
/// mutation it ever sees is mark-read.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: NotificationKind,
    pub subject: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
