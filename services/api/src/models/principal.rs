//! Authenticated caller identity

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Caller role carried in the token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Employee,
    Owner,
    Superadmin,
}

/// Roles allowed to administer pay periods, devices and audit logs.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Owner, Role::Superadmin];

/// Roles allowed to override punches.
pub const SUPERVISOR_ROLES: &[Role] = &[
    Role::Supervisor,
    Role::Manager,
    Role::Admin,
    Role::Owner,
    Role::Superadmin,
];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Supervisor => "SUPERVISOR",
            Role::Employee => "EMPLOYEE",
            Role::Owner => "OWNER",
            Role::Superadmin => "SUPERADMIN",
        }
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
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "SUPERVISOR" => Ok(Role::Supervisor),
            "EMPLOYEE" => Ok(Role::Employee),
            "OWNER" => Ok(Role::Owner),
            "SUPERADMIN" => Ok(Role::Superadmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Identity of the caller, built per request from verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: i64,
    pub organization_id: i64,
    pub role: Role,
    pub email: String,
}

impl Principal {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}
