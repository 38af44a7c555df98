//! Redis-backed `CartHeaderStore` implementation.
//!
//! The header lives as one JSON string under the configured header key.
//! Creation stamps the validated TTL with `SET ... EX`; replacement keeps
//! the entry's remaining lifetime with `SET ... KEEPTTL` so a cart's expiry
//! is fixed at creation and never silently extended by updates.

use async_trait::async_trait;
use bb8_redis::redis;
use tracing::debug;

use crate::domain::cart::{CartHeader, CartTtl};
use crate::domain::ports::{CartHeaderStore, CartHeaderStoreError, CartKeySpace};
use crate::domain::user::UserId;

use super::{CachePool, CachePoolError};

/// Redis implementation of the [`CartHeaderStore`] port.
#[derive(Clone)]
pub struct RedisCartHeaderStore {
    pool: CachePool,
    keys: CartKeySpace,
}

impl RedisCartHeaderStore {
    /// Create the store over a pool and key space.
    pub fn new(pool: CachePool, keys: CartKeySpace) -> Self {
        Self { pool, keys }
    }
}

fn map_pool_error(error: CachePoolError) -> CartHeaderStoreError {
    CartHeaderStoreError::backend(error)
}

fn map_redis_error(error: redis::RedisError) -> CartHeaderStoreError {
    debug!(error = %error, "cart header redis command failed");
    CartHeaderStoreError::backend(error)
}

fn encode_header(header: &CartHeader) -> Result<String, CartHeaderStoreError> {
    serde_json::to_string(header).map_err(CartHeaderStoreError::serialization)
}

fn decode_header(payload: &str) -> Result<CartHeader, CartHeaderStoreError> {
    serde_json::from_str(payload).map_err(CartHeaderStoreError::serialization)
}

#[async_trait]
impl CartHeaderStore for RedisCartHeaderStore {
    async fn put(
        &self,
        header: &CartHeader,
        ttl: Option<CartTtl>,
    ) -> Result<(), CartHeaderStoreError> {
        let key = self.keys.header_key(header.user_id());
        let payload = encode_header(header)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(&payload);
        match ttl {
            Some(ttl) => cmd.arg("EX").arg(ttl.as_secs()),
            None => cmd.arg("KEEPTTL"),
        };
        let () = cmd.query_async(&mut *conn).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<CartHeader>, CartHeaderStoreError> {
        let key = self.keys.header_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let payload: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        payload.as_deref().map(decode_header).transpose()
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError> {
        let key = self.keys.header_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError> {
        let key = self.keys.header_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let present: i64 = redis::cmd("EXISTS")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(present > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn header_round_trips_through_the_wire_format() {
        let header = CartHeader::new(UserId::random(), CartTtl::default_ttl());
        let payload = encode_header(&header).expect("encode succeeds");
        let back = decode_header(&payload).expect("decode succeeds");
        assert_eq!(back, header);
    }

    #[rstest]
    fn corrupt_payload_surfaces_as_serialization_error() {
        let err = decode_header("{not json").expect_err("corrupt payload rejected");
        assert!(matches!(err, CartHeaderStoreError::Serialization { .. }));
    }

    #[rstest]
    fn pool_error_maps_to_backend() {
        let err = map_pool_error(CachePoolError::checkout("pool exhausted"));
        assert!(matches!(err, CartHeaderStoreError::Backend { .. }));
        assert!(err.to_string().contains("pool exhausted"));
    }
}
