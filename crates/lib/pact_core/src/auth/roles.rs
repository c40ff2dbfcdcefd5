// @zen-component: AUTH-Roles
//
//! Closed role set and the authorization check.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// User roles. The set is closed; a user's role is immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    SectorOwner,
    GtcPoint,
    External,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::SectorOwner => "SECTOR_OWNER",
            Self::GtcPoint => "GTC_POINT",
            Self::External => "EXTERNAL",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "ADMIN" => Ok(Self::Admin),
            "SECTOR_OWNER" => Ok(Self::SectorOwner),
            "GTC_POINT" => Ok(Self::GtcPoint),
            "EXTERNAL" => Ok(Self::External),
            other => Err(CoreError::Internal(format!("unknown role: {other}"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure role gate: does `actual` satisfy one of `required`?
pub fn authorize(required: &[Role], actual: Role) -> bool {
    required.contains(&actual)
}

/// Role gate as a `CoreResult`, for use at the top of guarded operations.
pub fn require_role(required: &[Role], actual: Role) -> Result<(), CoreError> {
    if authorize(required, actual) {
        Ok(())
    } else {
        Err(CoreError::Authorization(format!(
            "role {actual} may not perform this operation"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 4] = [Role::Admin, Role::SectorOwner, Role::GtcPoint, Role::External];

    #[test]
    fn authorize_exact_match_only() {
        for actual in ALL {
            for required in ALL {
                assert_eq!(authorize(&[required], actual), required == actual);
            }
        }
    }

    #[test]
    fn authorize_any_of_set() {
        assert!(authorize(&[Role::Admin, Role::SectorOwner], Role::SectorOwner));
        assert!(!authorize(&[Role::Admin, Role::SectorOwner], Role::GtcPoint));
        assert!(!authorize(&[], Role::Admin));
    }

    #[test]
    fn require_role_rejects_with_authorization_error() {
        let err = require_role(&[Role::Admin], Role::External).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in ALL {
            let parsed = Role::try_from(role.as_str().to_string()).unwrap();
            assert_eq!(parsed, role);
        }
        assert!(Role::try_from("SUPERUSER".to_string()).is_err());
    }
}
