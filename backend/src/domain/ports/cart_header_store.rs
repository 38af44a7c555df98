//! Port for the cache entry holding a shopper's cart header.

use async_trait::async_trait;

use crate::domain::cart::{CartHeader, CartTtl};
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by cart header store adapters.
    pub enum CartHeaderStoreError {
        /// Cache backend is unavailable or timing out.
        Backend => "cart header store backend failure: {message}",
        /// Stored payload could not be encoded or decoded.
        Serialization => "cart header serialisation failed: {message}",
    }
}

/// Store for the per-shopper cart header entry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartHeaderStore: Send + Sync {
    /// Write the header. `Some(ttl)` stamps a fresh expiry (creation);
    /// `None` keeps the entry's remaining lifetime (replacement of mutable
    /// fields).
    async fn put(&self, header: &CartHeader, ttl: Option<CartTtl>)
        -> Result<(), CartHeaderStoreError>;

    /// Read the shopper's header, if one exists.
    async fn find(&self, user_id: &UserId) -> Result<Option<CartHeader>, CartHeaderStoreError>;

    /// Remove the header; `true` when an entry was actually removed.
    async fn delete(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError>;

    /// Cheap existence probe, used to decide between a direct item write and
    /// a compound header-plus-item creation.
    async fn exists(&self, user_id: &UserId) -> Result<bool, CartHeaderStoreError>;
}
