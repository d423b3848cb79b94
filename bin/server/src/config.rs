//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested
//! sections use `__` as the separator, so `AUTH0__DOMAIN` fills
//! `auth0.domain`. The Auth0 and super-admin settings are also read from
//! their single-underscore names (`AUTH0_DOMAIN`, `ADMIN_EMAIL`, ...); the
//! `__` form wins when both are set.
//!
//! See [`OidcConfig`](jobby_platform_access::OidcConfig) for identity
//! provider configuration.

use config::Map;
use jobby_platform_access::OidcConfig;
use serde::Deserialize;

/// Single-underscore variables and the keys they fill.
const FLAT_NAMES: [(&str, &str); 9] = [
    ("AUTH0_DOMAIN", "auth0.domain"),
    ("AUTH0_CLIENT_ID", "auth0.client_id"),
    ("AUTH0_CLIENT_SECRET", "auth0.client_secret"),
    ("AUTH0_CALLBACK_URL", "auth0.callback_url"),
    ("ADMIN_NAME", "admin.name"),
    ("ADMIN_EMAIL", "admin.email"),
    ("ADMIN_PASSWORD", "admin.password"),
    ("ADMIN_PICTURE", "admin.picture"),
    ("ADMIN_MOBILE_NUMBER", "admin.mobile_number"),
];

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// HMAC secret for access tokens.
    pub secret_key: String,

    /// Socket address to bind.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Identity provider configuration.
    pub auth0: OidcConfig,

    /// User cache configuration.
    pub redis: RedisConfig,

    /// Notification service configuration.
    pub novu: NovuConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Super-admin seed. Only read when no super-admin exists yet.
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

/// Redis connection for the user cache.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,

    #[serde(default = "default_redis_pool_max")]
    pub pool_max: usize,

    /// Lifetime of a cached user account.
    #[serde(default = "default_redis_ttl_seconds")]
    pub ttl_seconds: u64,
}

/// Novu notification API.
#[derive(Debug, Clone, Deserialize)]
pub struct NovuConfig {
    pub api_key: String,

    #[serde(default = "default_novu_base_url")]
    pub base_url: String,

    /// Pending notification jobs kept before new ones are dropped.
    #[serde(default = "default_novu_queue_capacity")]
    pub queue_capacity: usize,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Cookie encryption key, at least 64 bytes. A random key is generated
    /// when absent, which logs everyone out on restart.
    #[serde(default)]
    pub cookie_secret: Option<String>,
}

/// Super-admin account created at first start.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
    pub picture: String,
    pub mobile_number: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_redis_pool_max() -> usize {
    8
}

fn default_redis_ttl_seconds() -> u64 {
    600
}

fn default_novu_base_url() -> String {
    "https://api.novu.co".to_string()
}

fn default_novu_queue_capacity() -> usize {
    256
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_cookies: default_secure_cookies(),
            cookie_secret: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::from_vars(vars)
    }

    fn from_vars(vars: Map<String, String>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (name, key) in FLAT_NAMES {
            if let Some(value) = vars.get(name) {
                builder = builder.set_default(key, value.as_str())?;
            }
        }

        // No try_parsing: values stay strings until deserialized, so a
        // numeric-looking password keeps its leading zeros.
        builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .source(Some(vars)),
            )
            .build()?
            .try_deserialize()
    }
}
