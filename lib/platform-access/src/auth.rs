//! The authenticated caller and the checks run against it.
//!
//! The request authenticator attaches an [`AuthenticatedUser`] to every
//! protected request. Role gates and ownership checks only look at it.

use jobby_core::{ProfileId, UserId};

use crate::error::AuthorizationError;
use crate::role::{Role, RoleAllowList};
use crate::user::{User, UserAccount};

/// The caller of a protected request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    account: UserAccount,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new(account: UserAccount) -> Self {
        Self { account }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.account.user().id()
    }

    #[must_use]
    pub fn user(&self) -> &User {
        self.account.user()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.account.user().role()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_admin()
    }

    /// The caller's own profile, if one exists.
    #[must_use]
    pub fn profile_id(&self) -> Option<ProfileId> {
        self.account.profile_id()
    }

    /// Checks the caller's role against a route's allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::RoleNotAllowed`] when the role is not listed.
    pub fn authorize(&self, allowed: RoleAllowList) -> Result<(), AuthorizationError> {
        if allowed.permits(self.role()) {
            Ok(())
        } else {
            Err(AuthorizationError::RoleNotAllowed { role: self.role() })
        }
    }

    /// Checks that a record hanging off `owner` may be reached by the caller.
    ///
    /// Administrators may reach any record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::NotOwner`] when the caller does not own it.
    pub fn ensure_owns_profile(
        &self,
        owner: ProfileId,
        resource: &str,
    ) -> Result<(), AuthorizationError> {
        if self.is_admin() || self.profile_id() == Some(owner) {
            Ok(())
        } else {
            Err(AuthorizationError::NotOwner {
                resource: resource.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role, profile_id: Option<ProfileId>) -> AuthenticatedUser {
        let user = User::new("12345".to_string(), role);
        AuthenticatedUser::new(UserAccount::new(user).with_profile_id(profile_id))
    }

    #[test]
    fn authorize_follows_allow_list() {
        assert!(caller(Role::Admin, None).authorize(RoleAllowList::ADMINS).is_ok());
        assert!(caller(Role::SuperAdmin, None).authorize(RoleAllowList::ADMINS).is_ok());
        assert_eq!(
            caller(Role::User, None).authorize(RoleAllowList::ADMINS),
            Err(AuthorizationError::RoleNotAllowed { role: Role::User })
        );
        const POSTERS: RoleAllowList = RoleAllowList::new(&[Role::Poster]);
        assert!(caller(Role::Poster, None).authorize(POSTERS).is_ok());
        assert!(caller(Role::Poster, None).authorize(RoleAllowList::EVERYBODY).is_err());
    }

    #[test]
    fn owner_may_reach_own_records() {
        let profile = ProfileId::new();
        assert!(
            caller(Role::User, Some(profile))
                .ensure_owns_profile(profile, "award")
                .is_ok()
        );
    }

    #[test]
    fn other_users_are_refused() {
        let err = caller(Role::User, Some(ProfileId::new()))
            .ensure_owns_profile(ProfileId::new(), "award")
            .expect_err("not owner");
        assert_eq!(
            err,
            AuthorizationError::NotOwner {
                resource: "award".to_string()
            }
        );
    }

    #[test]
    fn user_without_profile_is_refused() {
        assert!(
            caller(Role::User, None)
                .ensure_owns_profile(ProfileId::new(), "profile")
                .is_err()
        );
    }

    #[test]
    fn administrators_bypass_ownership() {
        for role in [Role::Admin, Role::SuperAdmin] {
            assert!(
                caller(role, None)
                    .ensure_owns_profile(ProfileId::new(), "award")
                    .is_ok()
            );
        }
    }
}
