use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// User role as understood by the admin console.
///
/// Ordered from least to most privileged so callers can compare roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "ts",
    derive(ts_rs::TS),
    ts(export, rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum Role {
    Cashier,
    Manager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Manager, Role::Cashier];

    /// Parse a role name as the backend emits it.
    ///
    /// Case-insensitive, tolerates a Spring-style `ROLE_` prefix, and maps the
    /// legacy `STORE_MANAGER` name onto `Manager`.
    pub fn parse(s: &str) -> Option<Role> {
        let upper = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match name {
            "SUPER_ADMIN" | "SUPERADMIN" => Some(Role::SuperAdmin),
            "ADMIN" => Some(Role::Admin),
            "MANAGER" | "STORE_MANAGER" => Some(Role::Manager),
            "CASHIER" => Some(Role::Cashier),
            _ => None,
        }
    }

    /// Parse a role, falling back to the least privileged role.
    pub fn parse_or_least(s: &str) -> Role {
        Role::parse(s).unwrap_or_else(|| {
            warn!(role = s, "Unknown role, treating as CASHIER");
            Role::Cashier
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Cashier => "CASHIER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse_or_least(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        assert_eq!(Role::parse("SUPER_ADMIN"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("MANAGER"), Some(Role::Manager));
        assert_eq!(Role::parse("CASHIER"), Some(Role::Cashier));
    }

    #[test]
    fn test_parse_aliases_and_case() {
        assert_eq!(Role::parse("STORE_MANAGER"), Some(Role::Manager));
        assert_eq!(Role::parse("store-manager"), Some(Role::Manager));
        assert_eq!(Role::parse("ROLE_ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("super admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("janitor"), None);
    }

    #[test]
    fn test_unknown_role_deserializes_as_cashier() {
        let role: Role = serde_json::from_str(r#""AUDITOR""#).unwrap();
        assert_eq!(role, Role::Cashier);
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Cashier);
    }
}
