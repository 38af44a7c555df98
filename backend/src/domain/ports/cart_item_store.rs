//! Port for the cache collection holding a shopper's cart line items.

use async_trait::async_trait;

use crate::domain::cart::CartItem;
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by cart item store adapters.
    pub enum CartItemStoreError {
        /// Cache backend is unavailable or timing out.
        Backend => "cart item store backend failure: {message}",
        /// Stored payload could not be encoded or decoded.
        Serialization => "cart item serialisation failed: {message}",
    }
}

/// Store for the per-shopper line-item collection, keyed by product inside
/// the shopper's entry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartItemStore: Send + Sync {
    /// Insert or replace the line for the item's product.
    async fn put(&self, user_id: &UserId, item: &CartItem) -> Result<(), CartItemStoreError>;

    /// Read the line for one product, if present.
    async fn find(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Option<CartItem>, CartItemStoreError>;

    /// Read every line in the shopper's cart.
    async fn all(&self, user_id: &UserId) -> Result<Vec<CartItem>, CartItemStoreError>;

    /// Remove the line for one product; `true` when a line was actually
    /// removed.
    async fn remove(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<bool, CartItemStoreError>;

    /// Drop the whole collection; `true` when an entry was actually removed.
    async fn delete_all(&self, user_id: &UserId) -> Result<bool, CartItemStoreError>;
}
