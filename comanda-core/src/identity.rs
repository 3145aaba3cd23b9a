use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Staff or customer role an action is performed under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Kitchen,
    Cashier,
    Rider,
    Owner,
    Customer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Kitchen,
        Role::Cashier,
        Role::Rider,
        Role::Owner,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Kitchen => "KITCHEN",
            Role::Cashier => "CASHIER",
            Role::Rider => "RIDER",
            Role::Owner => "OWNER",
            Role::Customer => "CUSTOMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::ValidationError(format!("unknown role: {}", s)))
    }
}

/// Who is asking for a lifecycle action.
///
/// Authentication happens upstream; the engine trusts the id and role it is
/// handed and only checks them against the transition table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn kitchen(id: impl Into<String>) -> Self {
        Self::new(id, Role::Kitchen)
    }

    pub fn cashier(id: impl Into<String>) -> Self {
        Self::new(id, Role::Cashier)
    }

    pub fn rider(id: impl Into<String>) -> Self {
        Self::new(id, Role::Rider)
    }

    pub fn owner(id: impl Into<String>) -> Self {
        Self::new(id, Role::Owner)
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::new(id, Role::Customer)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}
