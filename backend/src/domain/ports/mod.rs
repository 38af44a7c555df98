//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the domain expects to interact with driven adapters
//! (the Redis cart cache, the PostgreSQL stock ledger, the external user
//! service). Each trait exposes strongly typed errors so adapters map their
//! failures into predictable variants instead of returning `anyhow::Result`.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_pipeline;
mod cart_header_store;
mod cart_item_store;
mod cart_key_space;
mod distributed_lock;
mod inventory_ledger;
mod user_directory;

#[cfg(test)]
pub use cache_pipeline::MockCachePipeline;
pub use cache_pipeline::{CachePipeline, CachePipelineError, CacheTransaction, CacheWrite};
#[cfg(test)]
pub use cart_header_store::MockCartHeaderStore;
pub use cart_header_store::{CartHeaderStore, CartHeaderStoreError};
#[cfg(test)]
pub use cart_item_store::MockCartItemStore;
pub use cart_item_store::{CartItemStore, CartItemStoreError};
pub use cart_key_space::{CartKeySpace, CartKeySpaceError};
#[cfg(test)]
pub use distributed_lock::MockDistributedLock;
pub use distributed_lock::{DistributedLock, DistributedLockError, LockToken};
#[cfg(test)]
pub use inventory_ledger::MockInventoryLedger;
pub use inventory_ledger::{InventoryLedger, InventoryLedgerError};
#[cfg(test)]
pub use user_directory::MockUserDirectory;
pub use user_directory::{FixtureUserDirectory, UserDirectory, UserDirectoryError};
