//! Authentication and authorization for the jobby job board.
//!
//! This crate provides:
//! - Users and roles (`User`, `UserAccount`, `Role`, `RoleAllowList`)
//! - External identities and the provider decoder registry
//! - The browser login session (`SessionState`)
//! - Access token issuance and verification (`AccessTokenIssuer`)
//! - Administrator passwords and one-time codes
//!
//! Nothing here touches the network or the database. The server crate wires
//! these types to axum, Postgres and the identity provider.
//!
//! # Example
//!
//! ```
//! use jobby_platform_access::{AccessTokenIssuer, Role, RoleAllowList};
//!
//! let issuer = AccessTokenIssuer::new("secret").unwrap();
//! let issued = issuer.issue("12345", false).unwrap();
//! let claims = issuer.verify(&issued.token).unwrap();
//! assert_eq!(claims.provider_id, "12345");
//!
//! assert!(RoleAllowList::ADMINS.permits(Role::SuperAdmin));
//! assert!(!RoleAllowList::ADMINS.permits(Role::User));
//! ```

pub mod auth;
pub mod error;
pub mod identity;
pub mod oidc;
pub mod password;
pub mod role;
pub mod session;
pub mod token;
pub mod user;

// Re-export main types at crate root
pub use auth::AuthenticatedUser;
pub use error::{AuthenticationError, AuthorizationError, IdentityError, RequestedRoleError};
pub use identity::{ExternalIdentity, ProviderRegistry, UnregisteredProviders, split_subject};
pub use oidc::OidcConfig;
pub use password::{generate_otp, hash_password, require_password, verify_password};
pub use role::{Role, RoleAllowList};
pub use session::SessionState;
pub use token::{AccessClaims, AccessTokenIssuer, IssuedToken, is_mobile_user_agent};
pub use user::{User, UserAccount};
