//! Atomic multi-key cache writes, staged first and submitted as one unit.
//!
//! The cart's invariants span two cache entries (header and items), so some
//! mutations must land on both keys or on neither. Callers stage writes into
//! a [`CacheTransaction`] and commit them through the [`CachePipeline`]
//! port, whose adapter submits the batch as a single atomic pipeline.
//! Composability comes from staging before commit; there is no rollback of
//! already-committed state.

use async_trait::async_trait;

use crate::domain::cart::{CartHeader, CartItem, CartTtl};
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::define_port_error;

/// One staged cache write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    /// Write the shopper's header; `Some(ttl)` stamps a fresh expiry,
    /// `None` keeps the remaining lifetime.
    PutHeader {
        /// Header to store.
        header: CartHeader,
        /// Fresh lifetime, or `None` to preserve the current one.
        ttl: Option<CartTtl>,
    },
    /// Insert or replace one line item in the shopper's collection.
    PutItem {
        /// Owner of the cart.
        user_id: UserId,
        /// Line to store.
        item: CartItem,
    },
    /// Remove one line item from the shopper's collection.
    RemoveItem {
        /// Owner of the cart.
        user_id: UserId,
        /// Product whose line is removed.
        product_id: ProductId,
    },
    /// Stamp an expiry on the shopper's item collection so it dies with the
    /// header.
    ExpireItems {
        /// Owner of the cart.
        user_id: UserId,
        /// Lifetime to stamp.
        ttl: CartTtl,
    },
    /// Remove the shopper's header entry.
    DeleteHeader {
        /// Owner of the cart.
        user_id: UserId,
    },
    /// Remove the shopper's whole item collection.
    DeleteAllItems {
        /// Owner of the cart.
        user_id: UserId,
    },
}

define_port_error! {
    /// Errors raised by cache pipeline adapters.
    pub enum CachePipelineError {
        /// The pipeline could not be submitted; nothing was applied.
        Submit => "cache pipeline submit failed: {message}",
        /// A staged payload could not be encoded; nothing was applied.
        Serialization => "cache pipeline serialisation failed: {message}",
    }
}

/// Port submitting a batch of staged writes as one atomic unit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CachePipeline: Send + Sync {
    /// Apply every staged write atomically. `Ok(true)` only when each write
    /// reported success; `Ok(false)` when the pipeline applied but some
    /// write's effect did not hold (e.g. expiring a key that was not
    /// there), so the caller can compensate. A transport error means
    /// nothing was applied.
    async fn apply(&self, writes: &[CacheWrite]) -> Result<bool, CachePipelineError>;
}

/// Staging buffer for one logical unit of cache writes.
#[derive(Debug, Default)]
pub struct CacheTransaction {
    writes: Vec<CacheWrite>,
}

impl CacheTransaction {
    /// Open an empty unit.
    #[must_use]
    pub const fn begin() -> Self {
        Self { writes: Vec::new() }
    }

    /// Stage one write without executing it.
    pub fn enqueue(&mut self, write: CacheWrite) {
        self.writes.push(write);
    }

    /// Number of staged writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing has been staged yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Submit the staged writes through the pipeline. An empty unit commits
    /// trivially without touching the backend.
    pub async fn commit<P>(self, pipeline: &P) -> Result<bool, CachePipelineError>
    where
        P: CachePipeline + ?Sized,
    {
        if self.writes.is_empty() {
            return Ok(true);
        }
        pipeline.apply(&self.writes).await
    }
}
