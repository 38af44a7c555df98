//! Stock counters and the append-only inventory audit trail.
//!
//! Each product carries two counters: `stock_quantity` (total owned stock)
//! and `reserved_stock` (stock earmarked for unconfirmed orders). Available
//! stock is always derived as the difference and never stored. The pure
//! transition math lives here on [`StockLevels`]; the persistence adapter
//! expresses the same transitions as conditional single-row updates so they
//! stay race-free under concurrent shoppers.
//!
//! Every successful counter mutation appends one immutable
//! [`InventoryLogEntry`], the only way to reconstruct stock history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::product::ProductId;
use super::user::UserId;

/// Snapshot of one product's stock counters.
///
/// Invariant: `0 <= reserved_stock <= stock_quantity`. The transition
/// methods uphold it; [`Self::available`] is always the derived difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    stock_quantity: i32,
    reserved_stock: i32,
    low_stock_threshold: i32,
}

impl StockLevels {
    /// Assemble a snapshot from stored counters.
    #[must_use]
    pub const fn new(stock_quantity: i32, reserved_stock: i32, low_stock_threshold: i32) -> Self {
        Self {
            stock_quantity,
            reserved_stock,
            low_stock_threshold,
        }
    }

    /// Total owned stock.
    #[must_use]
    pub const fn stock_quantity(&self) -> i32 {
        self.stock_quantity
    }

    /// Stock earmarked for in-flight orders.
    #[must_use]
    pub const fn reserved_stock(&self) -> i32 {
        self.reserved_stock
    }

    /// Threshold below which the product counts as running low.
    #[must_use]
    pub const fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    /// Stock offerable to new reservations.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.stock_quantity - self.reserved_stock
    }

    /// Whether the available stock has fallen to the threshold or below.
    #[must_use]
    pub const fn is_low(&self) -> bool {
        self.available() <= self.low_stock_threshold
    }

    /// Take delivery of new stock. `None` when `quantity` is not positive
    /// or the counter would overflow.
    #[must_use]
    pub fn add(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 {
            return None;
        }
        Some(Self {
            stock_quantity: self.stock_quantity.checked_add(quantity)?,
            ..self
        })
    }

    /// Set the total to an absolute value, clamping the reservation down so
    /// available stock never goes negative. `None` when `new_quantity` is
    /// negative.
    #[must_use]
    pub fn adjust(self, new_quantity: i32) -> Option<Self> {
        if new_quantity < 0 {
            return None;
        }
        Some(Self {
            stock_quantity: new_quantity,
            reserved_stock: self.reserved_stock.min(new_quantity),
            ..self
        })
    }

    /// Remove damaged or lost stock. `None` when `quantity` is not positive
    /// or exceeds the total on hand.
    #[must_use]
    pub fn write_off(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 || quantity > self.stock_quantity {
            return None;
        }
        let remaining = self.stock_quantity - quantity;
        Some(Self {
            stock_quantity: remaining,
            reserved_stock: self.reserved_stock.min(remaining),
            ..self
        })
    }

    /// Earmark stock for an order. Strict: `None` when `quantity` is not
    /// positive or exceeds the available stock.
    #[must_use]
    pub fn reserve(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 || quantity > self.available() {
            return None;
        }
        Some(Self {
            reserved_stock: self.reserved_stock + quantity,
            ..self
        })
    }

    /// Give back an earmark. Forgiving: the release is clamped to what is
    /// actually reserved, so over-releasing is not an error. `None` only
    /// when `quantity` is not positive.
    #[must_use]
    pub fn release(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 {
            return None;
        }
        Some(Self {
            reserved_stock: (self.reserved_stock - quantity).max(0),
            ..self
        })
    }

    /// Consume stock at order confirmation: both counters drop by the same
    /// quantity, since reservation only earmarks and confirmation is when
    /// stock physically leaves. `None` when `quantity` is not positive or
    /// exceeds the total on hand.
    #[must_use]
    pub fn confirm(self, quantity: i32) -> Option<Self> {
        if quantity <= 0 || quantity > self.stock_quantity {
            return None;
        }
        Some(Self {
            stock_quantity: self.stock_quantity - quantity,
            reserved_stock: (self.reserved_stock - quantity).max(0),
            ..self
        })
    }
}

/// Kind of stock change recorded in the audit trail.
///
/// The string values are a stable export contract; downstream consumers of
/// the log depend on them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockChangeType {
    /// Stock consumed by a confirmed order.
    Purchase,
    /// Stock returned after a refunded order.
    Return,
    /// Manual absolute correction of the total.
    StockAdjustment,
    /// First stock recorded for a product.
    InitialStock,
    /// Stock earmarked for an in-flight order.
    Reserved,
    /// Earmark given back after cancellation or a failed checkout.
    ReleaseReservation,
    /// Stock written off as damaged or lost.
    Damaged,
    /// Ordinary delivery of new stock.
    Restock,
}

impl StockChangeType {
    /// The stable wire value stored in the log row.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "Purchase",
            Self::Return => "Return",
            Self::StockAdjustment => "StockAdjustment",
            Self::InitialStock => "InitialStock",
            Self::Reserved => "Reserved",
            Self::ReleaseReservation => "ReleaseReservation",
            Self::Damaged => "Damaged",
            Self::Restock => "Restock",
        }
    }
}

impl fmt::Display for StockChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockChangeType {
    type Err = StockChangeTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Purchase" => Ok(Self::Purchase),
            "Return" => Ok(Self::Return),
            "StockAdjustment" => Ok(Self::StockAdjustment),
            "InitialStock" => Ok(Self::InitialStock),
            "Reserved" => Ok(Self::Reserved),
            "ReleaseReservation" => Ok(Self::ReleaseReservation),
            "Damaged" => Ok(Self::Damaged),
            "Restock" => Ok(Self::Restock),
            other => Err(StockChangeTypeParseError {
                value: other.to_owned(),
            }),
        }
    }
}

/// A stored change-type string did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stock change type {value:?}")]
pub struct StockChangeTypeParseError {
    /// The unrecognised stored value.
    pub value: String,
}

/// Why stock is being added, determining the audit-log change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestockKind {
    /// Ordinary delivery.
    Restock,
    /// Inventory coming back from a refunded order.
    Return,
    /// Seeding a product's very first stock.
    InitialStock,
}

impl RestockKind {
    /// The audit-log change type this kind records as.
    #[must_use]
    pub const fn change_type(&self) -> StockChangeType {
        match self {
            Self::Restock => StockChangeType::Restock,
            Self::Return => StockChangeType::Return,
            Self::InitialStock => StockChangeType::InitialStock,
        }
    }
}

/// Link from a ledger mutation to the business record that caused it,
/// typically an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReference {
    id: Uuid,
    kind: String,
}

impl StockReference {
    /// Reference an arbitrary business record.
    pub fn new(id: Uuid, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
        }
    }

    /// Reference an order, the common case.
    #[must_use]
    pub fn order(id: Uuid) -> Self {
        Self::new(id, "Order")
    }

    /// The referenced record's identifier.
    #[must_use]
    pub const fn id(&self) -> &Uuid {
        &self.id
    }

    /// The referenced record's kind, e.g. `"Order"`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// One immutable row of the inventory audit trail.
///
/// Written only as a side effect of a successful counter mutation; never
/// updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLogEntry {
    /// Product whose counters changed.
    pub product_id: ProductId,
    /// Total stock after the change.
    pub resulting_quantity: i32,
    /// Signed quantity of the change.
    pub quantity_delta: i32,
    /// What kind of change this was.
    pub change_type: StockChangeType,
    /// Identifier of the business record that caused the change.
    pub reference_id: Option<Uuid>,
    /// Kind of the referenced record, e.g. `"Order"`.
    pub reference_type: Option<String>,
    /// Free-text note attached by the operator.
    pub note: Option<String>,
    /// When the change was recorded (UTC).
    pub created_at: DateTime<Utc>,
    /// Staff member who performed the change, when known.
    pub actor_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn available_is_derived() {
        let levels = StockLevels::new(10, 4, 2);
        assert_eq!(levels.available(), 6);
    }

    #[rstest]
    #[case::within(StockLevels::new(10, 0, 0), 6, Some(6))]
    #[case::everything(StockLevels::new(10, 0, 0), 10, Some(10))]
    #[case::too_much(StockLevels::new(10, 6, 0), 6, None)]
    #[case::zero(StockLevels::new(10, 0, 0), 0, None)]
    #[case::negative(StockLevels::new(10, 0, 0), -3, None)]
    fn reserve_is_strict(
        #[case] levels: StockLevels,
        #[case] quantity: i32,
        #[case] reserved_after: Option<i32>,
    ) {
        let outcome = levels.reserve(quantity);
        assert_eq!(outcome.map(|l| l.reserved_stock()), reserved_after);
    }

    #[rstest]
    fn release_clamps_to_reserved() {
        let levels = StockLevels::new(10, 3, 0);
        let released = levels.release(8).expect("release succeeds");
        assert_eq!(released.reserved_stock(), 0);
        assert_eq!(released.stock_quantity(), 10);
    }

    #[rstest]
    fn release_then_reserve_restores_available() {
        let levels = StockLevels::new(10, 6, 0);
        let round_trip = levels
            .release(4)
            .and_then(|l| l.reserve(4))
            .expect("round trip succeeds");
        assert_eq!(round_trip, levels);
    }

    #[rstest]
    fn adjust_clamps_reservation_down() {
        let levels = StockLevels::new(10, 8, 0);
        let adjusted = levels.adjust(5).expect("adjust succeeds");
        assert_eq!(adjusted.stock_quantity(), 5);
        assert_eq!(adjusted.reserved_stock(), 5);
        assert_eq!(adjusted.available(), 0);
    }

    #[rstest]
    fn adjust_rejects_negative_total() {
        assert_eq!(StockLevels::new(10, 0, 0).adjust(-1), None);
    }

    #[rstest]
    fn confirm_consumes_from_both_counters() {
        let levels = StockLevels::new(10, 6, 0);
        let confirmed = levels.confirm(6).expect("confirm succeeds");
        assert_eq!(confirmed.stock_quantity(), 4);
        assert_eq!(confirmed.reserved_stock(), 0);
    }

    #[rstest]
    fn confirm_floors_reservation_at_zero() {
        let levels = StockLevels::new(10, 2, 0);
        let confirmed = levels.confirm(5).expect("confirm succeeds");
        assert_eq!(confirmed.stock_quantity(), 5);
        assert_eq!(confirmed.reserved_stock(), 0);
    }

    #[rstest]
    fn confirm_rejects_more_than_on_hand() {
        assert_eq!(StockLevels::new(4, 4, 0).confirm(5), None);
    }

    #[rstest]
    fn write_off_clamps_reservation() {
        let levels = StockLevels::new(10, 9, 0);
        let remaining = levels.write_off(4).expect("write off succeeds");
        assert_eq!(remaining.stock_quantity(), 6);
        assert_eq!(remaining.reserved_stock(), 6);
    }

    #[rstest]
    fn add_rejects_non_positive() {
        assert_eq!(StockLevels::new(1, 0, 0).add(0), None);
        assert_eq!(StockLevels::new(1, 0, 0).add(-2), None);
    }

    #[rstest]
    fn is_low_compares_available_to_threshold() {
        assert!(StockLevels::new(10, 8, 2).is_low());
        assert!(!StockLevels::new(10, 2, 2).is_low());
    }

    #[rstest]
    #[case(StockChangeType::Purchase, "Purchase")]
    #[case(StockChangeType::Return, "Return")]
    #[case(StockChangeType::StockAdjustment, "StockAdjustment")]
    #[case(StockChangeType::InitialStock, "InitialStock")]
    #[case(StockChangeType::Reserved, "Reserved")]
    #[case(StockChangeType::ReleaseReservation, "ReleaseReservation")]
    #[case(StockChangeType::Damaged, "Damaged")]
    #[case(StockChangeType::Restock, "Restock")]
    fn change_type_wire_values_are_stable(#[case] kind: StockChangeType, #[case] wire: &str) {
        assert_eq!(kind.as_str(), wire);
        assert_eq!(wire.parse::<StockChangeType>().ok(), Some(kind));
    }

    #[rstest]
    fn change_type_rejects_unknown_value() {
        let err = "Gifted".parse::<StockChangeType>().expect_err("unknown value");
        assert_eq!(err.value, "Gifted");
    }
}
