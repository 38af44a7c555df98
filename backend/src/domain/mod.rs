//! Domain entities, services, and ports.
//!
//! Purpose: model the cart cache and the inventory ledger as strongly typed
//! aggregates, and expose the driving services that mutate them through the
//! ports in [`ports`]. Types keep their invariants internal and document the
//! serialisation contracts (serde) in each type's Rustdoc.

pub mod cart;
pub mod cart_facade;
pub mod cart_headers;
pub mod cart_items;
pub mod inventory;
pub mod order_inventory;
pub mod ports;
pub mod product;
pub mod user;

pub use self::cart::{Cart, CartHeader, CartItem, CartItemError, CartTtl, CartTtlError};
pub use self::cart_facade::CartFacade;
pub use self::cart_headers::CartHeaderService;
pub use self::cart_items::CartItemService;
pub use self::inventory::{
    InventoryLogEntry, RestockKind, StockChangeType, StockChangeTypeParseError, StockLevels,
    StockReference,
};
pub use self::order_inventory::{OrderInventoryService, OrderLine};
pub use self::product::ProductId;
pub use self::user::UserId;
