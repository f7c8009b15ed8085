use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Role of an account. Part of a peer's identity: the same id under two
/// roles names two different people.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Role {
    Student,
    Teacher,
    Hod,
    Principal,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Teacher,
        Role::Hod,
        Role::Principal,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Hod => "hod",
            Role::Principal => "principal",
            Role::Admin => "admin",
        }
    }

    /// Case-insensitive parse of the wire spelling.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
    }
}

impl TryFrom<String> for Role {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value).ok_or(DecodeError::UnknownRole(value))
    }
}

impl std::str::FromStr for Role {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| DecodeError::UnknownRole(s.to_string()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable conversation counterpart.
///
/// Equality and hashing cover both fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Peer {
    #[serde(deserialize_with = "crate::lenient::string")]
    pub id: String,
    pub role: Role,
}

impl Peer {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.role, self.id)
    }
}

/// The authenticated user. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The principal as seen from the other side of a conversation.
    pub fn as_peer(&self) -> Peer {
        Peer::new(self.id.clone(), self.role)
    }
}

/// Directory grouping used by `/api/messages/directory`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RoleGroup {
    Teachers,
    Students,
    Hod,
    Principal,
}

impl RoleGroup {
    pub const ALL: [RoleGroup; 4] = [
        RoleGroup::Teachers,
        RoleGroup::Students,
        RoleGroup::Hod,
        RoleGroup::Principal,
    ];

    /// Key of this group inside the `directory` object.
    pub fn key(&self) -> &'static str {
        match self {
            RoleGroup::Teachers => "teachers",
            RoleGroup::Students => "students",
            RoleGroup::Hod => "hod",
            RoleGroup::Principal => "principal",
        }
    }

    /// Role assumed for entries that do not carry one.
    pub fn default_role(&self) -> Role {
        match self {
            RoleGroup::Teachers => Role::Teacher,
            RoleGroup::Students => Role::Student,
            RoleGroup::Hod => Role::Hod,
            RoleGroup::Principal => Role::Principal,
        }
    }

    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Teacher => Some(RoleGroup::Teachers),
            Role::Student => Some(RoleGroup::Students),
            Role::Hod => Some(RoleGroup::Hod),
            Role::Principal => Some(RoleGroup::Principal),
            Role::Admin => None,
        }
    }
}
