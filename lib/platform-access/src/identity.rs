//! External identities and the provider claim decoders.
//!
//! Auth0 subjects look like `<issuer-prefix>|<opaque-id>`. The prefix names
//! the upstream connection (Google, email/password, GitHub), and each
//! connection returns a differently shaped set of ID token claims. A
//! [`ProviderRegistry`] maps each prefix to a decoder and is checked against
//! the configured providers at startup, so an unsupported prefix fails at
//! boot rather than on someone's first login.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::AuthenticationError;

/// Identity asserted by a verified ID token.
///
/// Never persisted on its own; only `provider_id` survives on the `User`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    issuer: String,
    subject: String,
    email: String,
    name: String,
    picture: String,
}

impl ExternalIdentity {
    /// Creates an identity for `subject` as issued by `issuer`.
    #[must_use]
    pub fn new(issuer: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            email: String::new(),
            name: String::new(),
            picture: String::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = picture.into();
        self
    }

    /// Issuer prefix, e.g. `google-oauth2`.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Full subject, e.g. `google-oauth2|12345`.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Email address, empty when the provider does not share one.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn picture(&self) -> &str {
        &self.picture
    }

    /// The opaque part of the subject, persisted as `users.provider_id`.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        split_subject(&self.subject).1
    }
}

/// Splits a subject into `(issuer prefix, opaque id)` at the first `|`.
///
/// A subject without a separator has an empty opaque id.
#[must_use]
pub fn split_subject(subject: &str) -> (&str, &str) {
    subject.split_once('|').unwrap_or((subject, ""))
}

/// Claim decoder for one provider.
pub type ClaimDecoder =
    fn(prefix: &str, subject: &str, claims: serde_json::Value) -> Result<ExternalIdentity, AuthenticationError>;

/// Claims returned for Google connections.
#[derive(Debug, Deserialize)]
struct GoogleClaims {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    picture: String,
}

/// Claims returned for Auth0 database (email/password) connections.
#[derive(Debug, Deserialize)]
struct EmailClaims {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    picture: String,
}

/// Claims returned for GitHub connections. GitHub does not share an email.
#[derive(Debug, Deserialize)]
struct GithubClaims {
    #[serde(default)]
    name: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    picture: String,
}

fn parse_claims<T: DeserializeOwned>(
    prefix: &str,
    claims: &serde_json::Value,
) -> Result<T, AuthenticationError> {
    T::deserialize(claims).map_err(|e| AuthenticationError::MalformedClaims {
        provider: prefix.to_string(),
        reason: e.to_string(),
    })
}

fn decode_google(
    prefix: &str,
    subject: &str,
    claims: serde_json::Value,
) -> Result<ExternalIdentity, AuthenticationError> {
    let parsed: GoogleClaims = parse_claims(prefix, &claims)?;
    let name = if parsed.name.is_empty() {
        format!("{} {}", parsed.given_name, parsed.family_name)
            .trim()
            .to_string()
    } else {
        parsed.name
    };
    Ok(ExternalIdentity::new(prefix, subject)
        .with_email(parsed.email)
        .with_name(name)
        .with_picture(parsed.picture))
}

fn decode_email(
    prefix: &str,
    subject: &str,
    claims: serde_json::Value,
) -> Result<ExternalIdentity, AuthenticationError> {
    let parsed: EmailClaims = parse_claims(prefix, &claims)?;
    let name = if parsed.name.is_empty() {
        parsed.nickname
    } else {
        parsed.name
    };
    Ok(ExternalIdentity::new(prefix, subject)
        .with_email(parsed.email)
        .with_name(name)
        .with_picture(parsed.picture))
}

fn decode_github(
    prefix: &str,
    subject: &str,
    claims: serde_json::Value,
) -> Result<ExternalIdentity, AuthenticationError> {
    let parsed: GithubClaims = parse_claims(prefix, &claims)?;
    let name = if parsed.name.is_empty() {
        parsed.nickname
    } else {
        parsed.name
    };
    Ok(ExternalIdentity::new(prefix, subject)
        .with_name(name)
        .with_picture(parsed.picture))
}

/// Error returned when a configured provider has no decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisteredProviders(pub Vec<String>);

impl std::fmt::Display for UnregisteredProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no claim decoder for providers: {}", self.0.join(", "))
    }
}

impl std::error::Error for UnregisteredProviders {}

/// Mapping from issuer prefix to claim decoder.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    decoders: HashMap<String, ClaimDecoder>,
}

impl ProviderRegistry {
    /// Prefix used by Google connections.
    pub const GOOGLE: &str = "google-oauth2";
    /// Prefix used by Auth0 database connections.
    pub const EMAIL: &str = "auth0";
    /// Prefix used by GitHub connections.
    pub const GITHUB: &str = "github";

    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry with the Google, email and GitHub decoders.
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_decoder(Self::GOOGLE, decode_google)
            .with_decoder(Self::EMAIL, decode_email)
            .with_decoder(Self::GITHUB, decode_github)
    }

    /// Registers `decoder` for `prefix`, replacing any previous one.
    #[must_use]
    pub fn with_decoder(mut self, prefix: impl Into<String>, decoder: ClaimDecoder) -> Self {
        self.decoders.insert(prefix.into(), decoder);
        self
    }

    /// Checks that every provider in `supported` has a decoder.
    ///
    /// # Errors
    ///
    /// Lists every supported provider that is missing a decoder.
    pub fn validate<S: AsRef<str>>(&self, supported: &[S]) -> Result<(), UnregisteredProviders> {
        let mut missing: Vec<String> = supported
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !self.decoders.contains_key(*p))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(UnregisteredProviders(missing))
        }
    }

    /// Decodes `claims` for `subject` using the decoder for its prefix.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::UnsupportedProvider`] for an unknown
    /// prefix and [`AuthenticationError::MalformedClaims`] when the claims do
    /// not fit the provider's shape.
    pub fn decode(
        &self,
        subject: &str,
        claims: serde_json::Value,
    ) -> Result<ExternalIdentity, AuthenticationError> {
        let (prefix, _) = split_subject(subject);
        let decoder =
            self.decoders
                .get(prefix)
                .ok_or_else(|| AuthenticationError::UnsupportedProvider {
                    prefix: prefix.to_string(),
                })?;
        decoder(prefix, subject, claims)
    }
}
