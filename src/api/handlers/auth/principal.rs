//! Request-scoped identity: roles and the authenticated principal.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Coarse-grained permission tier attached to every user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Parse the storage representation ("USER"/"ADMIN"), case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Authority string as it appears in authentication responses.
    #[must_use]
    pub const fn authority(self) -> &'static str {
        match self {
            Self::User => "ROLE_USER",
            Self::Admin => "ROLE_ADMIN",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated identity attached to one request after token validation.
///
/// Only the request authenticator constructs this, and only from a token that
/// passed signature verification and expiry. Roles are read from the freshly
/// loaded user record, not from the token claims, so a role change takes
/// effect on the next request rather than at the next token renewal.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    #[must_use]
    pub fn authorities(&self) -> Vec<String> {
        self.roles
            .iter()
            .map(|role| role.authority().to_string())
            .collect()
    }
}
