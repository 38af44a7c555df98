//! Cart aggregates kept in the distributed cache.
//!
//! A cart is split across two cache entries that share the shopper's key:
//! the [`CartHeader`] (status, totals, coupon, TTL) and the per-product
//! [`CartItem`] collection. The two are created and destroyed together
//! inside one cache transaction; between those boundaries an item change
//! never touches the header. [`Cart`] is the composed read view returned by
//! the facade.

use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::product::ProductId;
use super::user::UserId;

/// Shortest lifetime a cart header may be created with.
pub const MIN_CART_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest lifetime a cart header may be created with.
pub const MAX_CART_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Validated cart lifetime, inclusive between 24 and 48 hours.
///
/// Requests outside the window are rejected at construction, never clamped.
/// Serialises as whole seconds so the value survives the JSON round trip
/// through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTtl(Duration);

impl CartTtl {
    /// Validate and wrap a duration.
    pub fn new(ttl: Duration) -> Result<Self, CartTtlError> {
        if ttl < MIN_CART_TTL || ttl > MAX_CART_TTL {
            return Err(CartTtlError::OutOfRange { requested: ttl });
        }
        Ok(Self(ttl))
    }

    /// The 24-hour lifetime given to carts created implicitly by a first
    /// item add.
    #[must_use]
    pub const fn default_ttl() -> Self {
        Self(MIN_CART_TTL)
    }

    /// Borrow the lifetime as a [`Duration`].
    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    /// Lifetime in whole seconds, as handed to the cache backend.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl Serialize for CartTtl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_secs())
    }
}

impl<'de> Deserialize<'de> for CartTtl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Self::new(Duration::from_secs(secs)).map_err(D::Error::custom)
    }
}

/// Rejection raised when constructing a [`CartTtl`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartTtlError {
    /// The requested lifetime is outside the inclusive 24–48 hour window.
    #[error("cart ttl must be between 24 and 48 hours, got {requested:?}")]
    OutOfRange {
        /// The duration the caller asked for.
        requested: Duration,
    },
}

/// Per-shopper cart metadata, stored separately from the line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartHeader {
    user_id: UserId,
    active: bool,
    total: Decimal,
    discount: Decimal,
    coupon_code: Option<String>,
    ttl: CartTtl,
}

impl CartHeader {
    /// Build a fresh header with zeroed totals and no coupon.
    #[must_use]
    pub const fn new(user_id: UserId, ttl: CartTtl) -> Self {
        Self {
            user_id,
            active: true,
            total: Decimal::ZERO,
            discount: Decimal::ZERO,
            coupon_code: None,
            ttl,
        }
    }

    /// The shopper who owns this cart.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Whether the cart is still open for mutation.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Cumulative total after discount.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Discount currently applied.
    #[must_use]
    pub const fn discount(&self) -> Decimal {
        self.discount
    }

    /// The applied coupon, if any.
    #[must_use]
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Lifetime the header was created with.
    #[must_use]
    pub const fn ttl(&self) -> CartTtl {
        self.ttl
    }

    /// Record a coupon and its discount amount. Totals are stale until
    /// [`Self::recalculate`] runs.
    pub fn apply_coupon(&mut self, code: impl Into<String>, discount: Decimal) {
        self.coupon_code = Some(code.into());
        self.discount = discount;
    }

    /// Drop the coupon and its discount.
    pub fn remove_coupon(&mut self) {
        self.coupon_code = None;
        self.discount = Decimal::ZERO;
    }

    /// Recompute the cumulative total from the line items, floored at zero
    /// so an oversized coupon never produces a negative cart.
    pub fn recalculate(&mut self, items: &[CartItem]) {
        let gross: Decimal = items.iter().map(CartItem::line_total).sum();
        self.total = (gross - self.discount).max(Decimal::ZERO);
    }

    /// Mark the cart as closed (converted to an order).
    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// One product line inside a shopper's cart.
///
/// Quantity is always at least 1: reducing a line to zero removes it from
/// the collection instead of storing a zero count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    product_id: ProductId,
    quantity: u32,
    unit_price: Decimal,
    product_name: String,
}

impl CartItem {
    /// Build a line item; rejects a zero quantity.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
        product_name: impl Into<String>,
    ) -> Result<Self, CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::ZeroQuantity);
        }
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            product_name: product_name.into(),
        })
    }

    /// The product this line refers to.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Units of the product in the cart.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Price per unit, denormalised from the catalogue at add time.
    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Display name, denormalised from the catalogue at add time.
    #[must_use]
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Replace the stored quantity; rejects zero (removal is a separate
    /// operation, not a stored state).
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), CartItemError> {
        if quantity == 0 {
            return Err(CartItemError::ZeroQuantity);
        }
        self.quantity = quantity;
        Ok(())
    }

    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Rejection raised when constructing or mutating a [`CartItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartItemError {
    /// Quantity must be at least 1; zero means the line does not exist.
    #[error("cart item quantity must be at least 1")]
    ZeroQuantity,
}

/// Composed read view of a cart: header plus line items.
///
/// Assembled from two independent cache reads with no cross-entity
/// guarantee, so the pair can be momentarily inconsistent under concurrent
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    header: CartHeader,
    items: Vec<CartItem>,
}

impl Cart {
    /// Compose the view from its two cache entries.
    #[must_use]
    pub fn new(header: CartHeader, items: Vec<CartItem>) -> Self {
        Self { header, items }
    }

    /// The cart's metadata entry.
    #[must_use]
    pub const fn header(&self) -> &CartHeader {
        &self.header
    }

    /// The cart's line items.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart holds no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Cart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cart[{}]: {} line(s), total {}",
            self.header.user_id(),
            self.items.len(),
            self.header.total()
        )
    }
}
