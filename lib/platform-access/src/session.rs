//! Browser login session state.
//!
//! The session lives entirely in an encrypted cookie. It is a tagged union
//! serialized through one schema: a login is either waiting for the
//! provider's callback, or the callback has succeeded and the browser may
//! call `authorize`.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::AuthenticationError;
use crate::identity::ExternalIdentity;
use crate::role::Role;

/// Contents of the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Login started; waiting for the provider to redirect back.
    LoginPending {
        /// Anti-forgery value echoed back by the provider.
        state: String,
        /// Role requested with `?type=`.
        requested_role: Role,
        /// OIDC nonce bound into the ID token.
        nonce: String,
        /// PKCE verifier for the code exchange.
        pkce_verifier: String,
    },
    /// Provider callback verified; identity known.
    Authenticated {
        requested_role: Role,
        /// Provider access token from the code exchange.
        access_token: String,
        /// Full subject, `<issuer-prefix>|<opaque-id>`.
        subject: String,
        identity: ExternalIdentity,
    },
}

impl SessionState {
    /// Checks a callback `state` against a pending login.
    ///
    /// The comparison is constant-time. On success returns the role, nonce
    /// and PKCE verifier stored at login.
    ///
    /// # Errors
    ///
    /// [`AuthenticationError::MissingLoginState`] if the session is not a
    /// pending login, and [`AuthenticationError::StateMismatch`] if the
    /// values differ.
    pub fn verify_callback_state(
        &self,
        presented: &str,
    ) -> Result<(Role, &str, &str), AuthenticationError> {
        match self {
            Self::LoginPending {
                state,
                requested_role,
                nonce,
                pkce_verifier,
            } => {
                if bool::from(state.as_bytes().ct_eq(presented.as_bytes())) {
                    Ok((*requested_role, nonce, pkce_verifier))
                } else {
                    Err(AuthenticationError::StateMismatch)
                }
            }
            Self::Authenticated { .. } => Err(AuthenticationError::MissingLoginState),
        }
    }

    /// Returns true once the provider callback has succeeded.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(state: &str) -> SessionState {
        SessionState::LoginPending {
            state: state.to_string(),
            requested_role: Role::User,
            nonce: "n-1".to_string(),
            pkce_verifier: "v-1".to_string(),
        }
    }

    #[test]
    fn matching_state_returns_login_data() {
        let session = pending("abc==");
        let (role, nonce, verifier) = session.verify_callback_state("abc==").expect("match");
        assert_eq!(role, Role::User);
        assert_eq!(nonce, "n-1");
        assert_eq!(verifier, "v-1");
    }

    #[test]
    fn mismatched_state_fails() {
        for presented in ["abd==", "abc", "abc==x", ""] {
            assert_eq!(
                pending("abc==").verify_callback_state(presented),
                Err(AuthenticationError::StateMismatch)
            );
        }
    }

    #[test]
    fn authenticated_session_has_no_pending_state() {
        let session = SessionState::Authenticated {
            requested_role: Role::Poster,
            access_token: "at".to_string(),
            subject: "auth0|1".to_string(),
            identity: ExternalIdentity::new("auth0", "auth0|1"),
        };
        assert!(session.is_authenticated());
        assert_eq!(
            session.verify_callback_state("anything"),
            Err(AuthenticationError::MissingLoginState)
        );
    }

    #[test]
    fn serialized_form_is_tagged() {
        let json = serde_json::to_value(pending("s")).expect("serialize");
        assert_eq!(json["status"], "login_pending");
        assert_eq!(json["requested_role"], "user");
    }

    #[test]
    fn round_trips_through_json() {
        let session = SessionState::Authenticated {
            requested_role: Role::User,
            access_token: "at".to_string(),
            subject: "google-oauth2|12345".to_string(),
            identity: ExternalIdentity::new("google-oauth2", "google-oauth2|12345")
                .with_email("a@example.com"),
        };
        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: SessionState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, session);
    }
}
