//! Row models bridging the inventory schema and the domain types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::inventory::{InventoryLogEntry, StockChangeType, StockLevels};
use crate::domain::ports::InventoryLedgerError;
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::schema::{inventory_log, products};

/// Stock counters as read from the `products` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductStockRow {
    /// Product identifier.
    pub id: Uuid,
    /// Total owned stock.
    pub stock_quantity: i32,
    /// Stock earmarked for unconfirmed orders.
    pub reserved_stock: i32,
    /// Low-stock threshold.
    pub low_stock_threshold: i32,
}

impl ProductStockRow {
    /// The row's counters as a domain snapshot.
    #[must_use]
    pub const fn levels(&self) -> StockLevels {
        StockLevels::new(
            self.stock_quantity,
            self.reserved_stock,
            self.low_stock_threshold,
        )
    }

    /// The row's product identifier as a domain id.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        ProductId::from_uuid(self.id)
    }
}

/// Audit entry as read from the `inventory_log` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = inventory_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InventoryLogRow {
    /// Row identifier.
    pub id: i64,
    /// Product whose counters changed.
    pub product_id: Uuid,
    /// Total stock after the change.
    pub resulting_quantity: i32,
    /// Signed quantity of the change.
    pub quantity_delta: i32,
    /// Stored change-type string.
    pub change_type: String,
    /// Causing business record id.
    pub reference_id: Option<Uuid>,
    /// Causing business record kind.
    pub reference_type: Option<String>,
    /// Operator note.
    pub note: Option<String>,
    /// When the change was recorded.
    pub created_at: DateTime<Utc>,
    /// Staff member who performed the change.
    pub actor_id: Option<Uuid>,
}

/// Convert a stored audit row to its domain entry.
///
/// A change-type string no variant matches means the row was written by
/// something newer (or corrupted) and surfaces as a query error rather
/// than being silently skipped.
pub fn row_to_entry(row: InventoryLogRow) -> Result<InventoryLogEntry, InventoryLedgerError> {
    let change_type = StockChangeType::from_str(&row.change_type)
        .map_err(|err| InventoryLedgerError::query(format!("corrupt audit row {}: {err}", row.id)))?;
    Ok(InventoryLogEntry {
        product_id: ProductId::from_uuid(row.product_id),
        resulting_quantity: row.resulting_quantity,
        quantity_delta: row.quantity_delta,
        change_type,
        reference_id: row.reference_id,
        reference_type: row.reference_type,
        note: row.note,
        created_at: row.created_at,
        actor_id: row.actor_id.map(UserId::from_uuid),
    })
}

/// Audit entry about to be appended. `created_at` comes from the database
/// default so clock skew between application hosts never reorders history.
#[derive(Debug, Insertable)]
#[diesel(table_name = inventory_log)]
pub struct NewInventoryLogRow<'a> {
    /// Product whose counters changed.
    pub product_id: Uuid,
    /// Total stock after the change.
    pub resulting_quantity: i32,
    /// Signed quantity of the change.
    pub quantity_delta: i32,
    /// Stable change-type string.
    pub change_type: &'a str,
    /// Causing business record id.
    pub reference_id: Option<Uuid>,
    /// Causing business record kind.
    pub reference_type: Option<&'a str>,
    /// Operator note.
    pub note: Option<&'a str>,
    /// Staff member who performed the change.
    pub actor_id: Option<Uuid>,
}
