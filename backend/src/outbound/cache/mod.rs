//! Redis adapters for the cart cache.
//!
//! All cart state that is not the inventory ledger lives in Redis: the
//! header as a JSON string, the item collection as a hash keyed by product,
//! locks as `SET NX PX` entries, and multi-key mutations as `MULTI`/`EXEC`
//! pipelines. Connections come from a shared `bb8` pool; keys follow the
//! configured [`crate::domain::ports::CartKeySpace`].

mod header_store;
mod item_store;
mod lock;
mod pipeline;

pub use header_store::RedisCartHeaderStore;
pub use item_store::RedisCartItemStore;
pub use lock::RedisDistributedLock;
pub use pipeline::RedisCachePipeline;

use std::time::Duration;

use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;

/// Errors that can occur while managing cache connections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CachePoolError {
    /// Failed to build the connection pool.
    #[error("failed to build cache connection pool: {message}")]
    Build {
        /// Failure detail from the pool builder.
        message: String,
    },

    /// Failed to check out a connection from the pool.
    #[error("failed to get cache connection from pool: {message}")]
    Checkout {
        /// Failure detail from the checkout.
        message: String,
    },
}

impl CachePoolError {
    /// Create a build error with the given message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a checkout error with the given message.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }
}

/// Configuration for the Redis connection pool.
#[derive(Debug, Clone)]
pub struct CachePoolConfig {
    cache_url: String,
    max_size: u32,
    connection_timeout: Duration,
}

impl CachePoolConfig {
    /// Create a configuration for the given `redis://` URL with defaults of
    /// 10 connections and a 5 second checkout timeout.
    pub fn new(cache_url: impl Into<String>) -> Self {
        Self {
            cache_url: cache_url.into(),
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Set the maximum number of pooled connections.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the connection checkout timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// The configured cache URL.
    #[must_use]
    pub fn cache_url(&self) -> &str {
        &self.cache_url
    }
}

/// Shared async connection pool for the Redis cache.
#[derive(Clone)]
pub struct CachePool {
    inner: Pool<RedisConnectionManager>,
}

impl CachePool {
    /// Build the pool from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CachePoolError::Build`] when the URL does not parse or the
    /// pool cannot be constructed.
    pub async fn new(config: CachePoolConfig) -> Result<Self, CachePoolError> {
        let manager = RedisConnectionManager::new(config.cache_url.as_str())
            .map_err(|err| CachePoolError::build(err.to_string()))?;
        let inner = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|err| CachePoolError::build(err.to_string()))?;
        Ok(Self { inner })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns [`CachePoolError::Checkout`] when no connection becomes
    /// available within the configured timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, CachePoolError> {
        self.inner
            .get()
            .await
            .map_err(|err| CachePoolError::checkout(err.to_string()))
    }
}
