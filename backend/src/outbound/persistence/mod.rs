//! PostgreSQL adapters for the inventory ledger.
//!
//! Diesel table definitions, row models, the async connection pool, and the
//! ledger adapter itself live here. All database operations are async via
//! `diesel-async`; the counter mutations are conditional single-row updates
//! so oversell checks happen inside the database, not in application code.

mod diesel_inventory_ledger;
mod models;
mod pool;
pub mod schema;

pub use diesel_inventory_ledger::DieselInventoryLedger;
pub use pool::{DbPool, DbPoolConfig, PoolError};
