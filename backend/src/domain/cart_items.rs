//! Cart line-item operations over the cache.
//!
//! The first item a shopper adds also has to bring the cart header into
//! existence; header and item are staged into one cache transaction so a
//! partially-created cart (header without items, or items without header)
//! is never observable. Later mutations touch only the item collection.
//!
//! The probe-then-create path is a race: two concurrent first adds can both
//! observe "no header" and both commit a compound create, in which case the
//! last committed transaction wins. That outcome is accepted by default;
//! wiring a [`DistributedLock`] via [`CartItemService::with_creation_lock`]
//! serialises the path per shopper for deployments that want the stronger
//! guarantee.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::cart::{CartHeader, CartItem, CartTtl};
use crate::domain::ports::{
    CachePipeline, CacheTransaction, CacheWrite, CartHeaderStore, CartItemStore, DistributedLock,
    LockToken, UserDirectory,
};
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

/// How long the per-shopper creation lock may outlive a crashed holder.
const CREATE_LOCK_TTL: Duration = Duration::from_secs(5);

/// Service owning the per-shopper line-item collection.
#[derive(Clone)]
pub struct CartItemService<I, H, P, U> {
    items: Arc<I>,
    headers: Arc<H>,
    pipeline: Arc<P>,
    users: Arc<U>,
    creation_lock: Option<Arc<dyn DistributedLock>>,
    default_ttl: CartTtl,
}

impl<I, H, P, U> CartItemService<I, H, P, U> {
    /// Create the service over its stores, pipeline, and user directory.
    ///
    /// Carts created implicitly by a first item add get the default
    /// 24-hour lifetime; the probe-then-create race stays last-write-wins
    /// until a creation lock is wired in.
    pub fn new(items: Arc<I>, headers: Arc<H>, pipeline: Arc<P>, users: Arc<U>) -> Self {
        Self {
            items,
            headers,
            pipeline,
            users,
            creation_lock: None,
            default_ttl: CartTtl::default_ttl(),
        }
    }

    /// Serialise compound cart creation per shopper through the given lock.
    #[must_use]
    pub fn with_creation_lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.creation_lock = Some(lock);
        self
    }

    /// Override the lifetime stamped on implicitly-created carts.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: CartTtl) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn creation_lock_key(user_id: &UserId) -> String {
        format!("cart:create:{user_id}")
    }
}

impl<I, H, P, U> CartItemService<I, H, P, U>
where
    I: CartItemStore,
    H: CartHeaderStore,
    P: CachePipeline,
    U: UserDirectory,
{
    /// Put a line in the shopper's cart.
    ///
    /// When the shopper has no header yet this is a compound operation:
    /// header, item, and the collection's expiry are committed as one cache
    /// transaction. With a header in place it is a single direct write that
    /// replaces any stored line for the same product.
    pub async fn add_item(&self, item: CartItem, user_id: UserId) -> bool {
        if !self.known_user(&user_id).await {
            return false;
        }
        match self.headers.exists(&user_id).await {
            Ok(true) => self.put_item(&user_id, &item).await,
            Ok(false) => self.create_cart_with_item(user_id, item).await,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header probe failed during item add");
                false
            }
        }
    }

    /// Bump a line's quantity by one.
    pub async fn increase_item(&self, product_id: &ProductId, user_id: &UserId) -> bool {
        if !self.known_user(user_id).await {
            return false;
        }
        let Some(mut item) = self.stored_item(user_id, product_id).await else {
            return false;
        };
        let bumped = item.quantity().saturating_add(1);
        if item.set_quantity(bumped).is_err() {
            return false;
        }
        self.put_item(user_id, &item).await
    }

    /// Drop a line's quantity by one; a line at quantity 1 is removed
    /// entirely rather than stored at zero.
    pub async fn decrease_item(&self, product_id: &ProductId, user_id: &UserId) -> bool {
        if !self.known_user(user_id).await {
            return false;
        }
        let Some(mut item) = self.stored_item(user_id, product_id).await else {
            return false;
        };
        if item.quantity() <= 1 {
            return self.remove_stored_item(user_id, product_id).await;
        }
        if item.set_quantity(item.quantity() - 1).is_err() {
            return false;
        }
        self.put_item(user_id, &item).await
    }

    /// Replace a line's quantity outright. Negative counts are rejected and
    /// zero delegates to removal.
    pub async fn update_item_count(
        &self,
        product_id: &ProductId,
        user_id: &UserId,
        new_count: i32,
    ) -> bool {
        if !self.known_user(user_id).await {
            return false;
        }
        if new_count < 0 {
            debug!(%user_id, %product_id, new_count, "rejected negative item count");
            return false;
        }
        if new_count == 0 {
            return self.remove_stored_item(user_id, product_id).await;
        }
        let Some(mut item) = self.stored_item(user_id, product_id).await else {
            return false;
        };
        let Ok(count) = u32::try_from(new_count) else {
            return false;
        };
        if item.set_quantity(count).is_err() {
            return false;
        }
        self.put_item(user_id, &item).await
    }

    /// Remove one line from the shopper's cart.
    pub async fn remove_item(&self, product_id: &ProductId, user_id: &UserId) -> bool {
        if !self.known_user(user_id).await {
            return false;
        }
        self.remove_stored_item(user_id, product_id).await
    }

    /// Every line in the shopper's cart. `None` when the shopper is unknown
    /// or the read fails.
    pub async fn items(&self, user_id: &UserId) -> Option<Vec<CartItem>> {
        if !self.known_user(user_id).await {
            return None;
        }
        match self.items.all(user_id).await {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(%user_id, error = %err, "cart items read failed");
                None
            }
        }
    }

    /// Drop the shopper's whole item collection.
    pub async fn delete_all_items(&self, user_id: &UserId) -> bool {
        if !self.known_user(user_id).await {
            return false;
        }
        match self.items.delete_all(user_id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%user_id, error = %err, "cart items delete failed");
                false
            }
        }
    }

    async fn create_cart_with_item(&self, user_id: UserId, item: CartItem) -> bool {
        let Some(lock) = self.creation_lock.clone() else {
            return self.compound_create(user_id, item).await;
        };

        let key = Self::creation_lock_key(&user_id);
        let token = LockToken::random();
        match lock.acquire(&key, &token, CREATE_LOCK_TTL).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%user_id, "cart creation contended, denying this add");
                return false;
            }
            Err(err) => {
                warn!(%user_id, error = %err, "cart creation lock acquire failed");
                return false;
            }
        }

        // The losing racer reaches here after the winner released, so probe
        // again before deciding between compound create and a direct write.
        let created = match self.headers.exists(&user_id).await {
            Ok(true) => self.put_item(&user_id, &item).await,
            Ok(false) => self.compound_create(user_id, item).await,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header probe failed under creation lock");
                false
            }
        };

        if let Err(err) = lock.release(&key, &token).await {
            warn!(%user_id, error = %err, "creation lock release failed, ttl will expire it");
        }
        created
    }

    async fn compound_create(&self, user_id: UserId, item: CartItem) -> bool {
        let header = CartHeader::new(user_id, self.default_ttl);
        let mut txn = CacheTransaction::begin();
        txn.enqueue(CacheWrite::PutHeader {
            header,
            ttl: Some(self.default_ttl),
        });
        txn.enqueue(CacheWrite::PutItem { user_id, item });
        txn.enqueue(CacheWrite::ExpireItems {
            user_id,
            ttl: self.default_ttl,
        });
        match txn.commit(self.pipeline.as_ref()).await {
            Ok(committed) => committed,
            Err(err) => {
                warn!(%user_id, error = %err, "compound cart create failed, nothing applied");
                false
            }
        }
    }

    async fn stored_item(&self, user_id: &UserId, product_id: &ProductId) -> Option<CartItem> {
        match self.items.find(user_id, product_id).await {
            Ok(item) => item,
            Err(err) => {
                warn!(%user_id, %product_id, error = %err, "cart item read failed");
                None
            }
        }
    }

    async fn put_item(&self, user_id: &UserId, item: &CartItem) -> bool {
        match self.items.put(user_id, item).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%user_id, error = %err, "cart item write failed");
                false
            }
        }
    }

    async fn remove_stored_item(&self, user_id: &UserId, product_id: &ProductId) -> bool {
        match self.items.remove(user_id, product_id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%user_id, %product_id, error = %err, "cart item remove failed");
                false
            }
        }
    }

    async fn known_user(&self, user_id: &UserId) -> bool {
        match self.users.user_exists(user_id).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(%user_id, error = %err, "user lookup failed, failing closed");
                false
            }
        }
    }
}
