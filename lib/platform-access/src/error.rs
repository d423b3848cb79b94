//! Error types for the platform-access crate.
//!
//! - `AuthenticationError`: proving who the caller is (OAuth flow, bearer tokens)
//! - `AuthorizationError`: deciding what an authenticated caller may do
//! - `IdentityError`: linking an external identity to a local user
//! - `RequestedRoleError`: the role a browser asks for at login

use std::fmt;

use crate::role::Role;

/// Errors from authentication operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No `Authorization: Bearer` header on a protected request.
    MissingCredential,
    /// Bearer token failed signature, algorithm, expiry or claim checks.
    InvalidToken { reason: String },
    /// The JWT signing secret is empty.
    InvalidSigningKey,
    /// Signing an access token failed.
    TokenSigning { reason: String },
    /// Hashing a local password failed.
    PasswordHashing { reason: String },
    /// No login was started in this browser session.
    MissingLoginState,
    /// The callback `state` does not match the one stored at login.
    StateMismatch,
    /// The provider rejected the authorization code.
    TokenExchange { reason: String },
    /// The provider's ID token could not be verified.
    TokenVerification { reason: String },
    /// The subject was issued by a provider with no registered decoder.
    UnsupportedProvider { prefix: String },
    /// The provider's claims did not match the expected shape.
    MalformedClaims { provider: String, reason: String },
    /// No user exists for an otherwise valid token.
    UserNotFound { provider_id: String },
    /// Local password check failed.
    InvalidCredentials,
    /// One-time password is unknown or expired.
    InvalidOtp,
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "missing bearer credential"),
            Self::InvalidToken { reason } => write!(f, "invalid token: {reason}"),
            Self::InvalidSigningKey => write!(f, "token signing key is empty"),
            Self::TokenSigning { reason } => write!(f, "failed to sign token: {reason}"),
            Self::PasswordHashing { reason } => write!(f, "failed to hash password: {reason}"),
            Self::MissingLoginState => write!(f, "no login in progress for this session"),
            Self::StateMismatch => write!(f, "state parameter does not match session"),
            Self::TokenExchange { reason } => {
                write!(f, "authorization code exchange failed: {reason}")
            }
            Self::TokenVerification { reason } => {
                write!(f, "ID token verification failed: {reason}")
            }
            Self::UnsupportedProvider { prefix } => {
                write!(f, "unsupported OAuth provider: {prefix}")
            }
            Self::MalformedClaims { provider, reason } => {
                write!(f, "malformed claims from provider '{provider}': {reason}")
            }
            Self::UserNotFound { provider_id } => {
                write!(f, "user not found for provider id: {provider_id}")
            }
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::InvalidOtp => write!(f, "invalid or expired one-time password"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from authorization operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No authenticated user is attached to the request.
    NotAuthenticated,
    /// The user's role is not on the route's allow-list.
    RoleNotAllowed { role: Role },
    /// The user does not own the record it tried to reach.
    NotOwner { resource: String },
    /// A local-credential login was attempted for a non-administrator.
    NotAdministrator,
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "user is not authenticated"),
            Self::RoleNotAllowed { role } => write!(f, "role '{role}' is not allowed"),
            Self::NotOwner { resource } => write!(f, "user does not own {resource}"),
            Self::NotAdministrator => write!(f, "user is not an administrator"),
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Errors from resolving an external identity to a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// A user with the same email is linked to another provider id.
    ProviderMismatch,
    /// The matching user is soft-deleted.
    AccountDeleted,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderMismatch => write!(
                f,
                "Provider ID mismatch for known user, please use a different provider or a different email"
            ),
            Self::AccountDeleted => write!(
                f,
                "your account was deleted, but hasn't been cleared, contact support to reinstate it or it would be permanently cleared after 3 months"
            ),
        }
    }
}

impl std::error::Error for IdentityError {}

/// Errors from the `type` a browser requests when starting a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedRoleError {
    /// No type given.
    Missing,
    /// The type is not one of the self-assignable roles.
    NotSelfAssignable { requested: String },
}

impl fmt::Display for RequestedRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "user type is required"),
            Self::NotSelfAssignable { .. } => write!(
                f,
                "user type can be either {} or {}",
                Role::Poster,
                Role::User
            ),
        }
    }
}

impl std::error::Error for RequestedRoleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_provider_names_prefix() {
        let err = AuthenticationError::UnsupportedProvider {
            prefix: "twitter".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported OAuth provider: twitter");
    }

    #[test]
    fn invalid_token_display() {
        let err = AuthenticationError::InvalidToken {
            reason: "InvalidAlgorithm".to_string(),
        };
        assert!(err.to_string().contains("invalid token"));
        assert!(err.to_string().contains("InvalidAlgorithm"));
    }

    #[test]
    fn hashing_is_not_reported_as_signing() {
        let err = AuthenticationError::PasswordHashing {
            reason: "output too short".to_string(),
        };
        assert_eq!(err.to_string(), "failed to hash password: output too short");
    }

    #[test]
    fn role_not_allowed_display() {
        let err = AuthorizationError::RoleNotAllowed { role: Role::Poster };
        assert!(err.to_string().contains("poster"));
    }

    #[test]
    fn identity_errors_are_actionable() {
        assert!(IdentityError::AccountDeleted.to_string().contains("contact support"));
        assert!(IdentityError::AccountDeleted.to_string().contains("3 months"));
        assert!(
            IdentityError::ProviderMismatch
                .to_string()
                .starts_with("Provider ID mismatch")
        );
    }

    #[test]
    fn requested_role_messages() {
        assert_eq!(RequestedRoleError::Missing.to_string(), "user type is required");
        let err = RequestedRoleError::NotSelfAssignable {
            requested: "admin".to_string(),
        };
        assert_eq!(err.to_string(), "user type can be either poster or user");
    }
}
