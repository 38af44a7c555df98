//! Drives the stock ledger on behalf of order assembly.
//!
//! Checkout reserves every line item; when any reservation is refused the
//! previously-made reservations for the same order are given back — a
//! compensating rollback, not a transaction, since the ledger offers no
//! multi-product atomicity. Payment success confirms the deductions;
//! cancellation of an unconfirmed order releases them; a refund of a
//! completed order restocks, because the stock was already consumed at
//! confirmation time.

use std::sync::Arc;

use tracing::warn;

use crate::domain::cart::CartItem;
use crate::domain::inventory::{RestockKind, StockReference};
use crate::domain::ports::InventoryLedger;
use crate::domain::product::ProductId;

/// One order line as the ledger sees it: a product and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    product_id: ProductId,
    quantity: i32,
}

impl OrderLine {
    /// Build a line; quantities are positive by construction.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: i32) -> Option<Self> {
        (quantity > 0).then_some(Self {
            product_id,
            quantity,
        })
    }

    /// The product being ordered.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Units being ordered.
    #[must_use]
    pub const fn quantity(&self) -> i32 {
        self.quantity
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: *item.product_id(),
            // Cart quantities are small by construction; saturate rather
            // than wrap if something absurd ever comes through.
            quantity: i32::try_from(item.quantity()).unwrap_or(i32::MAX),
        }
    }
}

/// Service walking order lines through the ledger's reservation protocol.
#[derive(Clone)]
pub struct OrderInventoryService<L> {
    ledger: Arc<L>,
}

impl<L> OrderInventoryService<L> {
    /// Create the service over the stock ledger.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

impl<L> OrderInventoryService<L>
where
    L: InventoryLedger,
{
    /// Reserve every line for the referenced order.
    ///
    /// All-or-nothing from the caller's point of view: the first refused or
    /// failed reservation releases everything reserved so far and the whole
    /// call reports `false`.
    pub async fn reserve_lines(&self, lines: &[OrderLine], reference: &StockReference) -> bool {
        let mut reserved: Vec<&OrderLine> = Vec::with_capacity(lines.len());
        for line in lines {
            match self
                .ledger
                .reserve(line.product_id(), line.quantity(), reference)
                .await
            {
                Ok(true) => reserved.push(line),
                Ok(false) => {
                    self.rollback_reservations(&reserved, reference).await;
                    return false;
                }
                Err(err) => {
                    warn!(
                        product_id = %line.product_id(),
                        reference_id = %reference.id(),
                        error = %err,
                        "reservation failed, rolling back this order's earmarks"
                    );
                    self.rollback_reservations(&reserved, reference).await;
                    return false;
                }
            }
        }
        true
    }

    /// Confirm the deduction for every line after payment success. Stops at
    /// the first refusal or failure and reports `false`; already-confirmed
    /// lines stay confirmed (stock has physically left).
    pub async fn confirm_lines(&self, lines: &[OrderLine], reference: &StockReference) -> bool {
        for line in lines {
            match self
                .ledger
                .confirm_deduction(line.product_id(), line.quantity(), reference)
                .await
            {
                Ok(true) => {}
                Ok(false) => return false,
                Err(err) => {
                    warn!(
                        product_id = %line.product_id(),
                        reference_id = %reference.id(),
                        error = %err,
                        "deduction confirm failed"
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Release every line's earmark after cancelling an unconfirmed order.
    /// Keeps going past failures so one bad line does not strand the rest;
    /// reports whether every release went through.
    pub async fn release_lines(&self, lines: &[OrderLine], reference: &StockReference) -> bool {
        let mut all_released = true;
        for line in lines {
            match self
                .ledger
                .release(line.product_id(), line.quantity(), reference)
                .await
            {
                Ok(released) => all_released &= released,
                Err(err) => {
                    warn!(
                        product_id = %line.product_id(),
                        reference_id = %reference.id(),
                        error = %err,
                        "reservation release failed"
                    );
                    all_released = false;
                }
            }
        }
        all_released
    }

    /// Return every line's stock after refunding a completed order. The
    /// stock was consumed at confirmation, so this is a restock with the
    /// `Return` audit kind, not a release.
    pub async fn restock_lines(&self, lines: &[OrderLine], reference: &StockReference) -> bool {
        let note = format!("refund of {} {}", reference.kind(), reference.id());
        let mut all_restocked = true;
        for line in lines {
            match self
                .ledger
                .add_stock(
                    line.product_id(),
                    line.quantity(),
                    RestockKind::Return,
                    Some(note.clone()),
                    None,
                )
                .await
            {
                Ok(restocked) => all_restocked &= restocked,
                Err(err) => {
                    warn!(
                        product_id = %line.product_id(),
                        reference_id = %reference.id(),
                        error = %err,
                        "refund restock failed"
                    );
                    all_restocked = false;
                }
            }
        }
        all_restocked
    }

    async fn rollback_reservations(&self, reserved: &[&OrderLine], reference: &StockReference) {
        for line in reserved {
            if let Err(err) = self
                .ledger
                .release(line.product_id(), line.quantity(), reference)
                .await
            {
                warn!(
                    product_id = %line.product_id(),
                    reference_id = %reference.id(),
                    error = %err,
                    "compensating release failed, earmark may be stranded until adjusted"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use uuid::Uuid;

    use crate::domain::ports::{InventoryLedgerError, MockInventoryLedger};

    fn order_ref() -> StockReference {
        StockReference::order(Uuid::new_v4())
    }

    fn line(product_id: ProductId, quantity: i32) -> OrderLine {
        OrderLine::new(product_id, quantity).expect("positive quantity")
    }

    #[test]
    fn order_line_rejects_non_positive_quantity() {
        assert!(OrderLine::new(ProductId::random(), 0).is_none());
        assert!(OrderLine::new(ProductId::random(), -2).is_none());
    }

    #[tokio::test]
    async fn reserve_lines_succeeds_when_every_line_reserves() {
        let lines = [line(ProductId::random(), 2), line(ProductId::random(), 1)];
        let mut ledger = MockInventoryLedger::new();
        ledger.expect_reserve().times(2).returning(|_, _, _| Ok(true));
        ledger.expect_release().times(0);

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(service.reserve_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn refused_reservation_releases_the_earlier_lines() {
        let first = ProductId::random();
        let second = ProductId::random();
        let lines = [line(first, 2), line(second, 5)];

        let mut seq = Sequence::new();
        let mut ledger = MockInventoryLedger::new();
        ledger
            .expect_reserve()
            .withf(move |product, quantity, _| *product == first && *quantity == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));
        ledger
            .expect_reserve()
            .withf(move |product, _, _| *product == second)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(false));
        ledger
            .expect_release()
            .withf(move |product, quantity, _| *product == first && *quantity == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(!service.reserve_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn transport_failure_also_rolls_back() {
        let first = ProductId::random();
        let lines = [line(first, 1), line(ProductId::random(), 1)];

        let mut calls = 0;
        let mut ledger = MockInventoryLedger::new();
        ledger.expect_reserve().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(true)
            } else {
                Err(InventoryLedgerError::connection("database gone"))
            }
        });
        ledger
            .expect_release()
            .withf(move |product, _, _| *product == first)
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(!service.reserve_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn confirm_lines_stops_at_the_first_refusal() {
        let lines = [line(ProductId::random(), 1), line(ProductId::random(), 1)];
        let mut calls = 0;
        let mut ledger = MockInventoryLedger::new();
        ledger
            .expect_confirm_deduction()
            .times(2)
            .returning(move |_, _, _| {
                calls += 1;
                Ok(calls == 1)
            });

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(!service.confirm_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn confirm_lines_succeeds_when_all_confirm() {
        let lines = [line(ProductId::random(), 3)];
        let mut ledger = MockInventoryLedger::new();
        ledger
            .expect_confirm_deduction()
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(service.confirm_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn release_lines_keeps_going_past_failures() {
        let lines = [line(ProductId::random(), 1), line(ProductId::random(), 1)];
        let mut calls = 0;
        let mut ledger = MockInventoryLedger::new();
        ledger.expect_release().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(InventoryLedgerError::connection("database gone"))
            } else {
                Ok(true)
            }
        });

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(!service.release_lines(&lines, &order_ref()).await);
    }

    #[tokio::test]
    async fn refund_restocks_with_the_return_kind() {
        let lines = [line(ProductId::random(), 4)];
        let reference = order_ref();
        let mut ledger = MockInventoryLedger::new();
        ledger
            .expect_add_stock()
            .withf(|_, quantity, kind, note, actor| {
                *quantity == 4
                    && *kind == RestockKind::Return
                    && note.as_deref().is_some_and(|n| n.contains("refund"))
                    && actor.is_none()
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));

        let service = OrderInventoryService::new(Arc::new(ledger));
        assert!(service.restock_lines(&lines, &reference).await);
    }

    #[tokio::test]
    async fn order_line_from_cart_item_copies_product_and_quantity() {
        let item = crate::domain::cart::CartItem::new(
            ProductId::random(),
            3,
            rust_decimal::Decimal::ONE,
            "widget",
        )
        .expect("valid item");
        let converted = OrderLine::from(&item);
        assert_eq!(converted.product_id(), item.product_id());
        assert_eq!(converted.quantity(), 3);
    }
}
