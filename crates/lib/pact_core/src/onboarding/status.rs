// @zen-component: ONB-Transitions
//
//! Onboarding status set and transition table.
//!
//! DRAFT → SUBMITTED → {APPROVED → COMPLETED | DECLINED}. The table is the
//! single source of truth for which action is legal in which state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    Draft,
    Submitted,
    Approved,
    Declined,
    Completed,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl TryFrom<String> for OnboardingStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "DRAFT" => Ok(Self::Draft),
            "SUBMITTED" => Ok(Self::Submitted),
            "APPROVED" => Ok(Self::Approved),
            "DECLINED" => Ok(Self::Declined),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(CoreError::Internal(format!(
                "unknown onboarding status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status-changing actions on an onboarding record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingAction {
    Submit,
    Approve,
    Decline,
    CompleteRegistration,
}

/// The transition table: `None` means the action is rejected in that state.
pub fn transition(
    status: OnboardingStatus,
    action: OnboardingAction,
) -> Option<OnboardingStatus> {
    use OnboardingAction as A;
    use OnboardingStatus as S;
    match (status, action) {
        (S::Draft, A::Submit) => Some(S::Submitted),
        (S::Submitted, A::Approve) => Some(S::Approved),
        (S::Submitted, A::Decline) => Some(S::Declined),
        (S::Approved, A::CompleteRegistration) => Some(S::Completed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OnboardingAction as A;
    use OnboardingStatus as S;

    const STATES: [S; 5] = [S::Draft, S::Submitted, S::Approved, S::Declined, S::Completed];
    const ACTIONS: [A; 4] = [A::Submit, A::Approve, A::Decline, A::CompleteRegistration];

    #[test]
    fn table_is_exhaustive_and_exact() {
        for state in STATES {
            for action in ACTIONS {
                let expected = match (state, action) {
                    (S::Draft, A::Submit) => Some(S::Submitted),
                    (S::Submitted, A::Approve) => Some(S::Approved),
                    (S::Submitted, A::Decline) => Some(S::Declined),
                    (S::Approved, A::CompleteRegistration) => Some(S::Completed),
                    _ => None,
                };
                assert_eq!(transition(state, action), expected, "{state:?} x {action:?}");
            }
        }
    }

    #[test]
    fn approve_is_single_shot() {
        // Once approved, a second approval is rejected by the table itself.
        assert_eq!(transition(S::Approved, A::Approve), None);
        assert_eq!(transition(S::Completed, A::Approve), None);
    }

    #[test]
    fn declined_and_completed_are_terminal() {
        for state in [S::Declined, S::Completed] {
            for action in ACTIONS {
                assert_eq!(transition(state, action), None);
            }
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for state in STATES {
            assert_eq!(S::try_from(state.as_str().to_string()).unwrap(), state);
        }
        assert!(S::try_from("PENDING".to_string()).is_err());
    }
}
