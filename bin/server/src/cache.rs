//! Cache of resolved user accounts, keyed by provider id.
//!
//! The request authenticator reads through this cache on every protected
//! request. Entries expire after a short TTL and are invalidated when the
//! user changes their own account.

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use jobby_platform_access::UserAccount;
use redis::AsyncCommands;
use rootcause::Report;
use std::fmt;

use crate::config::RedisConfig;

/// Errors from the user cache.
#[derive(Debug)]
pub enum CacheError {
    /// The connection pool could not be created.
    Configuration { details: String },
    /// No connection could be taken from the pool.
    Connection { details: String },
    /// A Redis command failed.
    Command { key: String, details: String },
    /// A cached value could not be encoded or decoded.
    Serialization { key: String, details: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "cache configuration error: {details}"),
            Self::Connection { details } => write!(f, "cache connection error: {details}"),
            Self::Command { key, details } => {
                write!(f, "cache command failed for '{key}': {details}")
            }
            Self::Serialization { key, details } => {
                write!(f, "cache entry '{key}' could not be (de)serialized: {details}")
            }
        }
    }
}

impl std::error::Error for CacheError {}

/// Storage for resolved user accounts.
#[async_trait]
pub trait UserCache: Send + Sync {
    /// Returns the cached account for `provider_id`, if any.
    async fn get(&self, provider_id: &str) -> jobby_core::Result<Option<UserAccount>, CacheError>;

    /// Stores `account` under its provider id.
    async fn put(&self, account: &UserAccount) -> jobby_core::Result<(), CacheError>;

    /// Drops any entry for `provider_id`.
    async fn invalidate(&self, provider_id: &str) -> jobby_core::Result<(), CacheError>;
}

fn cache_key(provider_id: &str) -> String {
    format!("user:{provider_id}")
}

/// Redis-backed [`UserCache`].
#[derive(Clone)]
pub struct RedisUserCache {
    pool: Pool,
    ttl_seconds: u64,
}

impl RedisUserCache {
    /// Creates the connection pool. Connections are opened lazily.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if the URL cannot be used.
    pub fn new(config: &RedisConfig) -> jobby_core::Result<Self, CacheError> {
        let mut cfg = Config::from_url(config.url.clone());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.pool_max));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Configuration {
                details: e.to_string(),
            })?;
        Ok(Self {
            pool,
            ttl_seconds: config.ttl_seconds,
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, Report<CacheError>> {
        Ok(self.pool.get().await.map_err(|e| CacheError::Connection {
            details: e.to_string(),
        })?)
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, provider_id: &str) -> jobby_core::Result<Option<UserAccount>, CacheError> {
        let key = cache_key(provider_id);
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn.get(&key).await.map_err(|e| CacheError::Command {
            key: key.clone(),
            details: e.to_string(),
        })?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let account = serde_json::from_str(&raw).map_err(|e| CacheError::Serialization {
            key,
            details: e.to_string(),
        })?;
        Ok(Some(account))
    }

    async fn put(&self, account: &UserAccount) -> jobby_core::Result<(), CacheError> {
        let key = cache_key(account.user().provider_id());
        let raw = serde_json::to_string(account).map_err(|e| CacheError::Serialization {
            key: key.clone(),
            details: e.to_string(),
        })?;

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(&key, raw, self.ttl_seconds)
            .await
            .map_err(|e| CacheError::Command {
                key: key.clone(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    async fn invalidate(&self, provider_id: &str) -> jobby_core::Result<(), CacheError> {
        let key = cache_key(provider_id);
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| CacheError::Command {
                key: key.clone(),
                details: e.to_string(),
            })?;
        Ok(())
    }
}

/// Drops the cached account for `provider_id`, logging instead of failing.
pub async fn invalidate_quietly(cache: &dyn UserCache, provider_id: &str) {
    if let Err(e) = cache.invalidate(provider_id).await {
        tracing::warn!(error = %e, provider_id, "Failed to invalidate cached user");
    }
}
