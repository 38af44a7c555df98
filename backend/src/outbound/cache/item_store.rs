//! Redis-backed `CartItemStore` implementation.
//!
//! The collection is a hash under the configured items key, one field per
//! product (the product UUID as the field name, the item as a JSON value).
//! Per-product adds and removes touch single fields, so two shoppers'
//! carts never contend and most mutations avoid read-modify-write on the
//! whole collection.

use async_trait::async_trait;
use bb8_redis::redis;
use tracing::debug;

use crate::domain::cart::CartItem;
use crate::domain::ports::{CartItemStore, CartItemStoreError, CartKeySpace};
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::{CachePool, CachePoolError};

/// Redis implementation of the [`CartItemStore`] port.
#[derive(Clone)]
pub struct RedisCartItemStore {
    pool: CachePool,
    keys: CartKeySpace,
}

impl RedisCartItemStore {
    /// Create the store over a pool and key space.
    pub fn new(pool: CachePool, keys: CartKeySpace) -> Self {
        Self { pool, keys }
    }
}

fn map_pool_error(error: CachePoolError) -> CartItemStoreError {
    CartItemStoreError::backend(error)
}

fn map_redis_error(error: redis::RedisError) -> CartItemStoreError {
    debug!(error = %error, "cart item redis command failed");
    CartItemStoreError::backend(error)
}

fn encode_item(item: &CartItem) -> Result<String, CartItemStoreError> {
    serde_json::to_string(item).map_err(CartItemStoreError::serialization)
}

fn decode_item(payload: &str) -> Result<CartItem, CartItemStoreError> {
    serde_json::from_str(payload).map_err(CartItemStoreError::serialization)
}

#[async_trait]
impl CartItemStore for RedisCartItemStore {
    async fn put(&self, user_id: &UserId, item: &CartItem) -> Result<(), CartItemStoreError> {
        let key = self.keys.items_key(user_id);
        let field = item.product_id().to_string();
        let payload = encode_item(item)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let _inserted: i64 = redis::cmd("HSET")
            .arg(&key)
            .arg(&field)
            .arg(&payload)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn find(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<CartItem>, CartItemStoreError> {
        let key = self.keys.items_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let payload: Option<String> = redis::cmd("HGET")
            .arg(&key)
            .arg(product_id.to_string())
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        payload.as_deref().map(decode_item).transpose()
    }

    async fn all(&self, user_id: &UserId) -> Result<Vec<CartItem>, CartItemStoreError> {
        let key = self.keys.items_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let payloads: Vec<String> = redis::cmd("HVALS")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        payloads.iter().map(|payload| decode_item(payload)).collect()
    }

    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<bool, CartItemStoreError> {
        let key = self.keys.items_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed: i64 = redis::cmd("HDEL")
            .arg(&key)
            .arg(product_id.to_string())
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<bool, CartItemStoreError> {
        let key = self.keys.items_key(user_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let removed: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }
}
