//! User roles.

use serde::{Deserialize, Serialize};

/// Error returned when a stored role string is not a known role.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

/// Role attached to a signed-in identity through its user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates businesses and provisions their logins.
    Admin,
    /// Views its own customers and issues stamps.
    Business,
}

impl Role {
    /// Login page for this role. Gated pages redirect here on denial.
    #[must_use]
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Business => "/business",
        }
    }

    /// Landing page after a successful login.
    #[must_use]
    pub const fn dashboard_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin/dashboard",
            Self::Business => "/business/dashboard",
        }
    }

    /// Stored string form (`admin` / `business`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Business => "business",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "business" => Ok(Self::Business),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_only() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("business".parse::<Role>().unwrap(), Role::Business);
        assert!("Admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_paths() {
        assert_eq!(Role::Admin.login_path(), "/admin");
        assert_eq!(Role::Business.login_path(), "/business");
        assert_eq!(Role::Business.dashboard_path(), "/business/dashboard");
    }
}
