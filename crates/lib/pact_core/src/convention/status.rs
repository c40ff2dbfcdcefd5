// @zen-component: CNV-Transitions
//
//! Convention status set and transition table.
//!
//! NEW → UPLOADED → {APPROVED | DECLINED}. Terminal states are immutable.
//! The table below is the single source of truth; service code never
//! branches on raw status strings.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConventionStatus {
    New,
    Uploaded,
    Approved,
    Declined,
}

impl ConventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Uploaded => "UPLOADED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Declined)
    }
}

impl TryFrom<String> for ConventionStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "NEW" => Ok(Self::New),
            "UPLOADED" => Ok(Self::Uploaded),
            "APPROVED" => Ok(Self::Approved),
            "DECLINED" => Ok(Self::Declined),
            other => Err(CoreError::Internal(format!(
                "unknown convention status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ConventionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status-changing actions on a convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConventionAction {
    Upload,
    Approve,
    Decline,
}

/// The transition table: `None` means the action is rejected in that state.
///
/// `Upload` from UPLOADED maps to UPLOADED: repeated uploads are legal but do
/// not re-fire the NEW→UPLOADED advance (and thus no duplicate notification).
pub fn transition(
    status: ConventionStatus,
    action: ConventionAction,
) -> Option<ConventionStatus> {
    use ConventionAction as A;
    use ConventionStatus as S;
    match (status, action) {
        (S::New, A::Upload) => Some(S::Uploaded),
        (S::Uploaded, A::Upload) => Some(S::Uploaded),
        (S::New | S::Uploaded, A::Approve) => Some(S::Approved),
        (S::New | S::Uploaded, A::Decline) => Some(S::Declined),
        (S::Approved | S::Declined, _) => None,
    }
}

/// Deletion is not a transition; it is legal only before anything happened.
pub fn deletable(status: ConventionStatus) -> bool {
    status == ConventionStatus::New
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConventionAction as A;
    use ConventionStatus as S;

    const STATES: [S; 4] = [S::New, S::Uploaded, S::Approved, S::Declined];
    const ACTIONS: [A; 3] = [A::Upload, A::Approve, A::Decline];

    #[test]
    fn table_is_exhaustive_and_exact() {
        for state in STATES {
            for action in ACTIONS {
                let expected = match (state, action) {
                    (S::New, A::Upload) => Some(S::Uploaded),
                    (S::Uploaded, A::Upload) => Some(S::Uploaded),
                    (S::New, A::Approve) | (S::Uploaded, A::Approve) => Some(S::Approved),
                    (S::New, A::Decline) | (S::Uploaded, A::Decline) => Some(S::Declined),
                    _ => None,
                };
                assert_eq!(transition(state, action), expected, "{state:?} x {action:?}");
            }
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for state in [S::Approved, S::Declined] {
            assert!(state.is_terminal());
            for action in ACTIONS {
                assert_eq!(transition(state, action), None);
            }
        }
    }

    #[test]
    fn only_new_is_deletable() {
        assert!(deletable(S::New));
        assert!(!deletable(S::Uploaded));
        assert!(!deletable(S::Approved));
        assert!(!deletable(S::Declined));
    }

    #[test]
    fn status_round_trips_through_text() {
        for state in STATES {
            assert_eq!(S::try_from(state.as_str().to_string()).unwrap(), state);
        }
        assert!(S::try_from("SIGNED".to_string()).is_err());
    }
}
