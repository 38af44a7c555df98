//! PostgreSQL-backed `InventoryLedger` implementation using Diesel.
//!
//! Every counter mutation is a conditional single-row `UPDATE`: the
//! operation's precondition sits in the `WHERE` clause, so the check and
//! the write are one atomic statement and concurrent shoppers cannot
//! oversell by racing between a read and a write. A statement that matches
//! no row — unknown product or failed precondition — reports `Ok(false)`.
//!
//! Only `confirm_deduction` wraps counter and audit append in an explicit
//! transaction; the other operations append best-effort after the counter
//! moved and report [`InventoryLedgerError::LogAppend`] when the append
//! fails without reverting the counter.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::inventory::{
    InventoryLogEntry, RestockKind, StockChangeType, StockLevels, StockReference,
};
use crate::domain::ports::{InventoryLedger, InventoryLedgerError};
use crate::domain::product::ProductId;
use crate::domain::user::UserId;

use super::models::{row_to_entry, InventoryLogRow, NewInventoryLogRow, ProductStockRow};
use super::pool::{DbPool, PoolError};
use super::schema::{inventory_log, products};

diesel::define_sql_function! {
    /// PostgreSQL `GREATEST` over two integers.
    fn greatest(a: Integer, b: Integer) -> Integer
}

diesel::define_sql_function! {
    /// PostgreSQL `LEAST` over two integers.
    fn least(a: Integer, b: Integer) -> Integer
}

/// Diesel-backed implementation of the [`InventoryLedger`] port.
#[derive(Clone)]
pub struct DieselInventoryLedger {
    pool: DbPool,
}

impl DieselInventoryLedger {
    /// Create the ledger over a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to ledger port errors.
fn map_pool_error(error: PoolError) -> InventoryLedgerError {
    InventoryLedgerError::connection(error)
}

/// Map Diesel errors to ledger port errors.
fn map_diesel_error(error: diesel::result::Error) -> InventoryLedgerError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "inventory diesel operation failed");
        }
        other => {
            debug!(error = %other, "inventory diesel operation failed");
        }
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            InventoryLedgerError::connection("database connection closed")
        }
        other => InventoryLedgerError::query(other.to_string()),
    }
}

impl DieselInventoryLedger {
    /// Append one audit row outside a transaction. The caller's counter
    /// update has already committed; a failure here is the documented
    /// partial-application window and maps to `LogAppend`.
    async fn append_log(
        &self,
        conn: &mut AsyncPgConnection,
        row: NewInventoryLogRow<'_>,
    ) -> Result<(), InventoryLedgerError> {
        diesel::insert_into(inventory_log::table)
            .values(&row)
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(InventoryLedgerError::log_append)
    }
}

#[async_trait]
impl InventoryLedger for DieselInventoryLedger {
    async fn add_stock(
        &self,
        product_id: &ProductId,
        quantity: i32,
        kind: RestockKind,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError> {
        if quantity <= 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let resulting: Option<i32> = diesel::update(
            products::table.filter(products::id.eq(product_id.as_uuid())),
        )
        .set((
            products::stock_quantity.eq(products::stock_quantity + quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .returning(products::stock_quantity)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let Some(resulting) = resulting else {
            return Ok(false);
        };
        self.append_log(
            &mut conn,
            NewInventoryLogRow {
                product_id: *product_id.as_uuid(),
                resulting_quantity: resulting,
                quantity_delta: quantity,
                change_type: kind.change_type().as_str(),
                reference_id: None,
                reference_type: None,
                note: note.as_deref(),
                actor_id: actor.map(|id| *id.as_uuid()),
            },
        )
        .await?;
        Ok(true)
    }

    async fn adjust_stock(
        &self,
        product_id: &ProductId,
        new_quantity: i32,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError> {
        if new_quantity < 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Read the old total first so the audit delta can be computed; the
        // counter write itself is absolute, so a racing mutation can only
        // skew the logged delta, never the counters.
        let before: Option<ProductStockRow> = products::table
            .filter(products::id.eq(product_id.as_uuid()))
            .select(ProductStockRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let Some(before) = before else {
            return Ok(false);
        };

        let resulting: Option<i32> = diesel::update(
            products::table.filter(products::id.eq(product_id.as_uuid())),
        )
        .set((
            products::stock_quantity.eq(new_quantity),
            products::reserved_stock.eq(least(products::reserved_stock, new_quantity)),
            products::updated_at.eq(Utc::now()),
        ))
        .returning(products::stock_quantity)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let Some(resulting) = resulting else {
            return Ok(false);
        };
        self.append_log(
            &mut conn,
            NewInventoryLogRow {
                product_id: *product_id.as_uuid(),
                resulting_quantity: resulting,
                quantity_delta: new_quantity - before.stock_quantity,
                change_type: StockChangeType::StockAdjustment.as_str(),
                reference_id: None,
                reference_type: None,
                note: note.as_deref(),
                actor_id: actor.map(|id| *id.as_uuid()),
            },
        )
        .await?;
        Ok(true)
    }

    async fn write_off(
        &self,
        product_id: &ProductId,
        quantity: i32,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Result<bool, InventoryLedgerError> {
        if quantity <= 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let resulting: Option<i32> = diesel::update(
            products::table
                .filter(products::id.eq(product_id.as_uuid()))
                .filter(products::stock_quantity.ge(quantity)),
        )
        .set((
            products::stock_quantity.eq(products::stock_quantity - quantity),
            products::reserved_stock
                .eq(least(products::reserved_stock, products::stock_quantity - quantity)),
            products::updated_at.eq(Utc::now()),
        ))
        .returning(products::stock_quantity)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let Some(resulting) = resulting else {
            return Ok(false);
        };
        self.append_log(
            &mut conn,
            NewInventoryLogRow {
                product_id: *product_id.as_uuid(),
                resulting_quantity: resulting,
                quantity_delta: -quantity,
                change_type: StockChangeType::Damaged.as_str(),
                reference_id: None,
                reference_type: None,
                note: note.as_deref(),
                actor_id: actor.map(|id| *id.as_uuid()),
            },
        )
        .await?;
        Ok(true)
    }

    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError> {
        if quantity <= 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // The availability check lives in the WHERE clause: check and
        // increment are one atomic statement, the property that makes
        // concurrent reservations oversell-safe.
        let resulting: Option<i32> = diesel::update(
            products::table
                .filter(products::id.eq(product_id.as_uuid()))
                .filter((products::stock_quantity - products::reserved_stock).ge(quantity)),
        )
        .set((
            products::reserved_stock.eq(products::reserved_stock + quantity),
            products::updated_at.eq(Utc::now()),
        ))
        .returning(products::stock_quantity)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let Some(resulting) = resulting else {
            return Ok(false);
        };
        self.append_log(
            &mut conn,
            NewInventoryLogRow {
                product_id: *product_id.as_uuid(),
                resulting_quantity: resulting,
                quantity_delta: -quantity,
                change_type: StockChangeType::Reserved.as_str(),
                reference_id: Some(*reference.id()),
                reference_type: Some(reference.kind()),
                note: None,
                actor_id: None,
            },
        )
        .await?;
        Ok(true)
    }

    async fn release(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError> {
        if quantity <= 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Forgiving by design: the decrement clamps at zero instead of
        // rejecting an over-release.
        let resulting: Option<i32> = diesel::update(
            products::table.filter(products::id.eq(product_id.as_uuid())),
        )
        .set((
            products::reserved_stock.eq(greatest(products::reserved_stock - quantity, 0)),
            products::updated_at.eq(Utc::now()),
        ))
        .returning(products::stock_quantity)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        let Some(resulting) = resulting else {
            return Ok(false);
        };
        self.append_log(
            &mut conn,
            NewInventoryLogRow {
                product_id: *product_id.as_uuid(),
                resulting_quantity: resulting,
                quantity_delta: quantity,
                change_type: StockChangeType::ReleaseReservation.as_str(),
                reference_id: Some(*reference.id()),
                reference_type: Some(reference.kind()),
                note: None,
                actor_id: None,
            },
        )
        .await?;
        Ok(true)
    }

    async fn confirm_deduction(
        &self,
        product_id: &ProductId,
        quantity: i32,
        reference: &StockReference,
    ) -> Result<bool, InventoryLedgerError> {
        if quantity <= 0 {
            return Ok(false);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let product_uuid = *product_id.as_uuid();
        let reference_id = *reference.id();
        let reference_kind = reference.kind().to_owned();

        // Counter and audit row must never be observed half-applied, so
        // this is the one operation wrapped in a relational transaction:
        // a failed append rolls the deduction back.
        conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            async move {
                let resulting: Option<i32> = diesel::update(
                    products::table
                        .filter(products::id.eq(product_uuid))
                        .filter(products::stock_quantity.ge(quantity)),
                )
                .set((
                    products::stock_quantity.eq(products::stock_quantity - quantity),
                    products::reserved_stock
                        .eq(greatest(products::reserved_stock - quantity, 0)),
                    products::updated_at.eq(Utc::now()),
                ))
                .returning(products::stock_quantity)
                .get_result(conn)
                .await
                .optional()?;

                let Some(resulting) = resulting else {
                    return Ok(false);
                };
                diesel::insert_into(inventory_log::table)
                    .values(&NewInventoryLogRow {
                        product_id: product_uuid,
                        resulting_quantity: resulting,
                        quantity_delta: -quantity,
                        change_type: StockChangeType::Purchase.as_str(),
                        reference_id: Some(reference_id),
                        reference_type: Some(&reference_kind),
                        note: None,
                        actor_id: None,
                    })
                    .execute(conn)
                    .await?;
                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn stock_levels(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockLevels>, InventoryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ProductStockRow> = products::table
            .filter(products::id.eq(product_id.as_uuid()))
            .select(ProductStockRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| row.levels()))
    }

    async fn history(
        &self,
        product_id: &ProductId,
        limit: i64,
    ) -> Result<Vec<InventoryLogEntry>, InventoryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<InventoryLogRow> = inventory_log::table
            .filter(inventory_log::product_id.eq(product_id.as_uuid()))
            .order((inventory_log::created_at.desc(), inventory_log::id.desc()))
            .limit(limit.max(0))
            .select(InventoryLogRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_entry).collect()
    }

    async fn low_stock(
        &self,
        limit: i64,
    ) -> Result<Vec<(ProductId, StockLevels)>, InventoryLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<ProductStockRow> = products::table
            .filter(
                (products::stock_quantity - products::reserved_stock)
                    .le(products::low_stock_threshold),
            )
            .order(products::stock_quantity.asc())
            .limit(limit.max(0))
            .select(ProductStockRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.product_id(), row.levels()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, InventoryLedgerError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        let diesel_err = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("connection gone".to_owned()),
        );
        assert!(matches!(
            map_diesel_error(diesel_err),
            InventoryLedgerError::Connection { .. }
        ));
    }

    #[rstest]
    fn other_diesel_errors_map_to_query_error() {
        let err = map_diesel_error(diesel::result::Error::NotFound);
        assert!(matches!(err, InventoryLedgerError::Query { .. }));
    }
}
