//! Port for the per-product stock ledger.
//!
//! The ledger owns the stock counters and their append-only audit trail.
//! Every mutation is an atomically-checked read-modify-write at the storage
//! layer; a plain read followed by a write would let two shoppers oversell
//! the same unit. Precondition failures and unknown products come back as
//! `Ok(false)`, never as errors, so callers branch on results instead of
//! catching.

use async_trait::async_trait;

use crate::domain::inventory::{InventoryLogEntry, RestockKind, StockLevels, StockReference};
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by inventory ledger adapters.
    pub enum InventoryLedgerError {
        /// Store connection could not be established.
        Connection => "inventory ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query => "inventory ledger query failed: {message}",
        /// The counter moved but the audit entry was not written. Only
        /// order confirmation rolls the counter back in this case; for
        /// every other operation the drift stands and is reported here.
        LogAppend => "inventory log append failed after counter update: {message}",
    }
}

/// State machine over one product's stock counters plus its audit trail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Take delivery of stock: `stock_quantity += quantity`. Requires a
    /// positive quantity and an existing product.
    async fn add_stock(
        &self,
        product_id: &ProductId,
        quantity: i32,
        kind: RestockKind,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError>;

    /// Set the total to an absolute value (manual correction), clamping the
    /// reservation down so available stock never goes negative. Requires a
    /// non-negative value.
    async fn adjust_stock(
        &self,
        product_id: &ProductId,
        new_quantity: i32,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError>;

    /// Remove damaged or lost stock. Requires a positive quantity no larger
    /// than the total on hand.
    async fn write_off(
        &self,
        product_id: &ProductId,
        quantity: i32,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError>;

    /// Earmark stock for an order: `reserved_stock += quantity`, only when
    /// the available stock covers it. Strict by design — the one operation
    /// whose precondition guards against overselling.
    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError>;

    /// Give an earmark back, clamped to what is actually reserved.
    /// Forgiving by design — returning too much is not an error.
    async fn release(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError>;

    /// Consume stock on payment success: both counters drop by `quantity`.
    /// Counter update and audit append happen inside one relational
    /// transaction — the only all-or-nothing operation on the ledger.
    async fn confirm_deduction(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError>;

    /// Current counters for a product.
    async fn stock_levels(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockLevels>, InventoryLedgerError>;

    /// Most recent audit entries for a product, newest first.
    async fn history(
        &self,
        product_id: &ProductId,
        limit: i64,
    ) -> Result<Vec<InventoryLogEntry>, InventoryLedgerError>;

    /// Products whose available stock sits at or below their threshold.
    async fn low_stock(
        &self,
        limit: i64,
    ) -> Result<Vec<(ProductId, StockLevels)>, InventoryLedgerError>;
}
