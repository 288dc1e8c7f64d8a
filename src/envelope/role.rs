//! Sender roles.
//!
//! Roles travel as strings. Unknown strings are preserved as [`Role::Unknown`]
//! instead of failing deserialization, so relays can drop them quietly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tier of the node that sent an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// The top-level supervisor owned by the facade.
    Root,
    /// A mid-level group supervisor (hierarchical topology only).
    Group,
    /// A leaf worker executing the task.
    Worker,
    /// Any role this build does not know about.
    Unknown(String),
}

impl Role {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Root => "supervisor-root",
            Role::Group => "mid-tier",
            Role::Worker => "leaf-worker",
            Role::Unknown(s) => s,
        }
    }

    /// Parses a wire role; never fails.
    pub fn parse(s: &str) -> Self {
        match s {
            "supervisor-root" => Role::Root,
            "mid-tier" => Role::Group,
            "leaf-worker" => Role::Worker,
            other => Role::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match Role::parse(&s) {
            Role::Unknown(_) => Role::Unknown(s),
            known => known,
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_roundtrip_through_strings() {
        for role in [Role::Root, Role::Group, Role::Worker] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }

    #[test]
    fn unknown_roles_are_preserved() {
        let role: Role = serde_json::from_str("\"observer\"").unwrap();
        assert_eq!(role, Role::Unknown("observer".into()));
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"observer\"");
    }
}
