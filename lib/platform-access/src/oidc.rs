//! Identity provider configuration.
//!
//! The job board delegates login to a hosted Auth0 tenant. Everything the
//! server needs to talk to it is derived from the tenant domain.

use serde::{Deserialize, Serialize};

/// Configuration for the hosted identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Tenant domain, e.g. "jobby.eu.auth0.com".
    domain: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// Absolute URL of `/api/v1/auth/callback`.
    callback_url: String,
    /// OAuth2 scopes to request as a comma-separated string.
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Subject prefixes the server accepts, comma-separated.
    #[serde(default = "default_providers")]
    providers: String,
}

fn default_scopes() -> String {
    "openid,profile,email".to_string()
}

fn default_providers() -> String {
    "google-oauth2,auth0,github".to_string()
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl OidcConfig {
    /// Creates a new configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        domain: String,
        client_id: String,
        client_secret: String,
        callback_url: String,
    ) -> Self {
        Self {
            domain,
            client_id,
            client_secret,
            callback_url,
            scopes: default_scopes(),
            providers: default_providers(),
        }
    }

    /// Replaces the supported provider prefixes.
    #[must_use]
    pub fn with_providers(mut self, providers: &[&str]) -> Self {
        self.providers = providers.join(",");
        self
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Issuer URL used for discovery: `https://<domain>/`.
    #[must_use]
    pub fn issuer_url(&self) -> String {
        format!("https://{}/", self.domain.trim_end_matches('/'))
    }

    /// API audience sent with the code exchange. Same as the issuer URL.
    #[must_use]
    pub fn audience(&self) -> String {
        self.issuer_url()
    }

    /// Base of the provider's logout endpoint, without query parameters.
    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        format!("{}v2/logout", self.issuer_url())
    }

    /// Returns the scopes to request.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        split_list(&self.scopes)
    }

    /// Returns the subject prefixes the server accepts.
    #[must_use]
    pub fn providers(&self) -> Vec<&str> {
        split_list(&self.providers)
    }
}
