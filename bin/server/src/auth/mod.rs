//! Authentication and authorization for the job board API.
//!
//! This module provides:
//! - The Auth0 login flow (`login`, `callback`, `authorize`, `logout`)
//! - Local-credential admin login confirmed by an emailed one-time code
//! - The bearer-token request authenticator and the role gate
//!
//! # Session model
//!
//! The browser session exists only for the duration of the OAuth dance and
//! lives in an encrypted cookie holding a
//! [`SessionState`](jobby_platform_access::SessionState). After `authorize`
//! the caller holds a signed access token and the server keeps no session
//! at all; every protected request re-resolves the user through the cache.

pub mod admin;
pub mod middleware;
pub mod oidc;
pub mod routes;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use jobby_platform_access::{AccessTokenIssuer, ProviderRegistry};
use std::sync::Arc;

use crate::cache::UserCache;
use crate::db::{AwardRepository, ProfileRepository, UserRepository};
use crate::notify::NotificationDispatcher;

pub use admin::{confirm_login_admin, login_admin};
pub use middleware::{RequireAuth, authenticate, require_roles};
pub use oidc::OidcClient;
pub use routes::{authorize, callback, login, logout};

/// Shared application state.
pub struct AppState {
    pub users: UserRepository,
    pub profiles: ProfileRepository,
    pub awards: AwardRepository,
    /// OIDC client for the identity provider.
    pub oidc_client: OidcClient,
    pub tokens: AccessTokenIssuer,
    /// Claim decoders, already checked against the configured providers.
    pub providers: ProviderRegistry,
    pub user_cache: Arc<dyn UserCache>,
    pub notifications: NotificationDispatcher,
    /// Key encrypting the session cookie.
    pub cookie_key: Key,
    /// Whether to set the Secure flag on cookies.
    pub secure_cookies: bool,
}

/// Session cookie key as seen by [`PrivateCookieJar`](axum_extra::extract::cookie::PrivateCookieJar).
#[derive(Clone)]
pub struct CookieKey(Key);

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Self {
        key.0
    }
}

impl FromRef<Arc<AppState>> for CookieKey {
    fn from_ref(state: &Arc<AppState>) -> Self {
        Self(state.cookie_key.clone())
    }
}

/// Builds the cookie key from a configured secret, or a random one.
///
/// Returns `None` when a secret is configured but shorter than 64 bytes.
pub fn cookie_key(secret: Option<&str>) -> Option<Key> {
    match secret {
        Some(secret) => Key::try_from(secret.as_bytes()).ok(),
        None => Some(Key::generate()),
    }
}
