//! Session data types shared by the auth and tree modules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Territorial role held by a user, ordered by descending scope breadth.
///
/// `StateCoordination` covers the whole state and is the broadest role;
/// `CommitteePresidency` covers a single committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    StateCoordination = 1,
    RegionalDelegation = 2,
    DistrictCoordination = 3,
    MunicipalCoordination = 4,
    SectionalCoordination = 5,
    CommitteePresidency = 6,
}

impl Role {
    /// All roles from broadest to narrowest scope.
    pub const ALL: [Role; 6] = [
        Role::StateCoordination,
        Role::RegionalDelegation,
        Role::DistrictCoordination,
        Role::MunicipalCoordination,
        Role::SectionalCoordination,
        Role::CommitteePresidency,
    ];

    /// Numeric value used on the wire.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Full human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Role::StateCoordination => "State coordinator",
            Role::RegionalDelegation => "Regional delegate",
            Role::DistrictCoordination => "District coordinator",
            Role::MunicipalCoordination => "Municipal coordinator",
            Role::SectionalCoordination => "Sectional coordinator",
            Role::CommitteePresidency => "Committee president",
        }
    }

    /// Compact label for table columns.
    pub fn short_label(self) -> &'static str {
        match self {
            Role::StateCoordination => "State coord.",
            Role::RegionalDelegation => "Regional deleg.",
            Role::DistrictCoordination => "District coord.",
            Role::MunicipalCoordination => "Municipal coord.",
            Role::SectionalCoordination => "Sectional coord.",
            Role::CommitteePresidency => "Committee pres.",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = InvalidRole;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Role::ALL
            .into_iter()
            .find(|role| role.number() == value)
            .ok_or(InvalidRole(value))
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role.number()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.number())
    }
}

/// A role number outside the defined enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role number: {0}")]
pub struct InvalidRole(pub u8);

/// The authenticated user as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Empty when the backend omits it.
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

/// A committee owned by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCommittee {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The user's role assignment and owned committees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub committees_owned: Vec<OwnedCommittee>,
}

impl Assignment {
    /// The assignment used when the role lookup fails: no role, no committees.
    pub fn degraded() -> Self {
        Self::default()
    }

    pub fn with_role(role: Role) -> Self {
        Self {
            role: Some(role),
            committees_owned: Vec::new(),
        }
    }

    /// First owned committee, which committee presidents are sent to directly.
    pub fn primary_committee(&self) -> Option<&OwnedCommittee> {
        self.committees_owned.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_number() {
        for role in Role::ALL {
            assert_eq!(Role::try_from(role.number()), Ok(role));
        }
    }

    #[test]
    fn unknown_role_number_is_rejected() {
        assert_eq!(Role::try_from(0), Err(InvalidRole(0)));
        assert_eq!(Role::try_from(7), Err(InvalidRole(7)));
    }

    #[test]
    fn roles_are_ordered_by_scope() {
        assert!(Role::StateCoordination < Role::RegionalDelegation);
        assert!(Role::SectionalCoordination < Role::CommitteePresidency);
        let mut roles = vec![
            Role::CommitteePresidency,
            Role::StateCoordination,
            Role::DistrictCoordination,
        ];
        roles.sort();
        assert_eq!(
            roles,
            vec![
                Role::StateCoordination,
                Role::DistrictCoordination,
                Role::CommitteePresidency,
            ]
        );
    }

    #[test]
    fn assignment_deserializes_null_role() {
        let assignment: Assignment =
            serde_json::from_str(r#"{"role": null, "committees_owned": []}"#).unwrap();
        assert_eq!(assignment, Assignment::degraded());
    }

    #[test]
    fn assignment_tolerates_extra_committee_fields() {
        let json = r#"{"role": 6, "committees_owned": [{"id": 12, "name": "Centro", "section": "0451"}]}"#;
        let assignment: Assignment = serde_json::from_str(json).unwrap();
        assert_eq!(assignment.role, Some(Role::CommitteePresidency));
        assert_eq!(assignment.primary_committee().map(|c| c.id), Some(12));
    }

    #[test]
    fn assignment_with_out_of_range_role_fails_to_decode() {
        let result = serde_json::from_str::<Assignment>(r#"{"role": 9, "committees_owned": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn user_phone_is_optional() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "name": "Ana", "email": "ana@example.org"}"#)
                .unwrap();
        assert_eq!(user.name, "Ana");
        assert!(user.phone.is_none());
    }

    #[test]
    fn user_email_defaults_to_empty() {
        let user: User = serde_json::from_str(r#"{"id": 1, "name": "Ana"}"#).unwrap();
        assert_eq!(user.id, 1);
        assert!(user.email.is_empty());
    }
}
