//! Roles and route-level role allow-lists.
//!
//! Every user carries exactly one role. Routes declare which roles may reach
//! them with a [`RoleAllowList`] fixed at registration time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RequestedRoleError;

/// Role of a user on the job board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The single bootstrap administrator.
    SuperAdmin,
    /// Administrator created by another administrator.
    Admin,
    /// Account that publishes companies and jobs.
    Poster,
    /// Job seeker.
    User,
}

impl Role {
    /// Returns the wire/database spelling of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super-admin",
            Self::Admin => "admin",
            Self::Poster => "poster",
            Self::User => "user",
        }
    }

    /// Returns true for roles that bypass per-record ownership checks.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// Parses the `type` a browser asks for when starting an OAuth login.
    ///
    /// Only `poster` and `user` can be self-assigned.
    ///
    /// # Errors
    ///
    /// Returns [`RequestedRoleError::Missing`] for an empty value and
    /// [`RequestedRoleError::NotSelfAssignable`] for anything else.
    pub fn from_login_type(value: &str) -> Result<Self, RequestedRoleError> {
        match value {
            "" => Err(RequestedRoleError::Missing),
            "poster" => Ok(Self::Poster),
            "user" => Ok(Self::User),
            other => Err(RequestedRoleError::NotSelfAssignable {
                requested: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super-admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "poster" => Ok(Self::Poster),
            "user" => Ok(Self::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Fixed set of roles allowed to reach a route.
///
/// Membership is exact and case-sensitive on the enum value; the order of
/// the list has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAllowList {
    roles: &'static [Role],
}

impl RoleAllowList {
    /// Administrators only.
    pub const ADMINS: Self = Self::new(&[Role::Admin, Role::SuperAdmin]);

    /// Job seekers and administrators.
    pub const EVERYBODY: Self = Self::new(&[Role::User, Role::Admin, Role::SuperAdmin]);

    /// Creates an allow-list from a static slice of roles.
    #[must_use]
    pub const fn new(roles: &'static [Role]) -> Self {
        Self { roles }
    }

    /// Returns true if `role` is a member of the list.
    #[must_use]
    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialization_format() {
        let json = serde_json::to_string(&Role::SuperAdmin).expect("serialize");
        assert_eq!(json, "\"super-admin\"");

        let json = serde_json::to_string(&Role::Poster).expect("serialize");
        assert_eq!(json, "\"poster\"");
    }

    #[test]
    fn from_str_matches_as_str() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Poster, Role::User] {
            assert_eq!(role.as_str().parse::<Role>().expect("parse"), role);
        }
    }

    #[test]
    fn from_str_is_case_sensitive() {
        assert!("Admin".parse::<Role>().is_err());
        assert!("SUPER-ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn only_admins_bypass_ownership() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Poster.is_admin());
        assert!(!Role::User.is_admin());
    }

    #[test]
    fn login_type_accepts_poster_and_user() {
        assert_eq!(Role::from_login_type("poster"), Ok(Role::Poster));
        assert_eq!(Role::from_login_type("user"), Ok(Role::User));
    }

    #[test]
    fn login_type_rejects_empty() {
        assert_eq!(Role::from_login_type(""), Err(RequestedRoleError::Missing));
    }

    #[test]
    fn login_type_rejects_admin_roles() {
        for value in ["admin", "super-admin", "User"] {
            assert!(matches!(
                Role::from_login_type(value),
                Err(RequestedRoleError::NotSelfAssignable { .. })
            ));
        }
    }

    #[test]
    fn admins_list() {
        let list = RoleAllowList::ADMINS;
        assert!(list.permits(Role::Admin));
        assert!(list.permits(Role::SuperAdmin));
        assert!(!list.permits(Role::User));
        assert!(!list.permits(Role::Poster));
    }

    #[test]
    fn everybody_excludes_posters() {
        let list = RoleAllowList::EVERYBODY;
        assert!(list.permits(Role::User));
        assert!(!list.permits(Role::Poster));
    }

    #[test]
    fn membership_is_order_independent() {
        const FORWARD: RoleAllowList = RoleAllowList::new(&[Role::User, Role::Admin]);
        const REVERSED: RoleAllowList = RoleAllowList::new(&[Role::Admin, Role::User]);
        for role in [Role::SuperAdmin, Role::Admin, Role::Poster, Role::User] {
            assert_eq!(FORWARD.permits(role), REVERSED.permits(role));
        }
    }

    #[test]
    fn empty_list_permits_nothing() {
        const NONE: RoleAllowList = RoleAllowList::new(&[]);
        assert!(!NONE.permits(Role::SuperAdmin));
    }
}
