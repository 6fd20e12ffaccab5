//! User roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A user's role, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    User,
    Company,
    ContentEditor,
    Admin,
    MasterAdmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Guest,
        Role::User,
        Role::Company,
        Role::ContentEditor,
        Role::Admin,
        Role::MasterAdmin,
    ];

    /// Every role except `Guest`.
    pub const AUTHENTICATED: [Role; 5] = [
        Role::User,
        Role::Company,
        Role::ContentEditor,
        Role::Admin,
        Role::MasterAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Company => "company",
            Role::ContentEditor => "content_editor",
            Role::Admin => "admin",
            Role::MasterAdmin => "master_admin",
        }
    }

    /// Numeric level used by `has_role_level` checks.
    pub fn level(&self) -> i64 {
        match self {
            Role::Guest => 0,
            Role::User => 20,
            Role::Company => 40,
            Role::ContentEditor => 60,
            Role::Admin => 80,
            Role::MasterAdmin => 100,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::MasterAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}
