//! Composed cart view and coordinated cart deletion.
//!
//! Reading composes the header and item entries from two independent cache
//! reads with no transactional guarantee across them, so a caller can
//! observe a momentarily inconsistent pair under concurrent mutation — an
//! accepted trade-off. Deletion, by contrast, must never leave one entry
//! behind, so it goes through a single atomic cache transaction.

use std::sync::Arc;

use tracing::warn;

use crate::domain::cart::Cart;
use crate::domain::ports::{CachePipeline, CacheTransaction, CacheWrite, CartHeaderStore, CartItemStore};
use crate::domain::user::UserId;

/// Facade composing the header and item entries into one logical cart.
#[derive(Clone)]
pub struct CartFacade<H, I, P> {
    headers: Arc<H>,
    items: Arc<I>,
    pipeline: Arc<P>,
}

impl<H, I, P> CartFacade<H, I, P> {
    /// Create the facade over both stores and the pipeline.
    pub fn new(headers: Arc<H>, items: Arc<I>, pipeline: Arc<P>) -> Self {
        Self {
            headers,
            items,
            pipeline,
        }
    }
}

impl<H, I, P> CartFacade<H, I, P>
where
    H: CartHeaderStore,
    I: CartItemStore,
    P: CachePipeline,
{
    /// Read the shopper's cart. `None` when no header exists or either read
    /// fails — never a partially-populated cart.
    pub async fn cart(&self, user_id: &UserId) -> Option<Cart> {
        let header = match self.headers.find(user_id).await {
            Ok(Some(header)) => header,
            Ok(None) => return None,
            Err(err) => {
                warn!(%user_id, error = %err, "cart header read failed");
                return None;
            }
        };
        let items = match self.items.all(user_id).await {
            Ok(items) => items,
            Err(err) => {
                warn!(%user_id, error = %err, "cart items read failed");
                return None;
            }
        };
        Some(Cart::new(header, items))
    }

    /// Delete header and items as one atomic unit. `true` only when both
    /// deletes and the commit succeeded.
    pub async fn delete_cart(&self, user_id: &UserId) -> bool {
        let mut txn = CacheTransaction::begin();
        txn.enqueue(CacheWrite::DeleteHeader { user_id: *user_id });
        txn.enqueue(CacheWrite::DeleteAllItems { user_id: *user_id });
        match txn.commit(self.pipeline.as_ref()).await {
            Ok(committed) => committed,
            Err(err) => {
                warn!(%user_id, error = %err, "cart delete failed, nothing applied");
                false
            }
        }
    }
}
