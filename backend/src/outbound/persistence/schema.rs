//! Diesel table definitions for the inventory schema.
//!
//! These definitions must match the migrations exactly; Diesel uses them
//! for compile-time query validation. The `products` table here is the
//! stock-relevant subset of the catalogue's product entity — catalogue
//! fields (name, price, categories) are owned elsewhere and never touched
//! by this subsystem.

diesel::table! {
    /// Per-product stock counters.
    ///
    /// Invariant, enforced by a check constraint and by every update this
    /// crate issues: `0 <= reserved_stock <= stock_quantity`.
    products (id) {
        /// Product identifier shared with the catalogue.
        id -> Uuid,
        /// Total owned stock.
        stock_quantity -> Int4,
        /// Stock earmarked for unconfirmed orders.
        reserved_stock -> Int4,
        /// Threshold at or below which the product counts as running low.
        low_stock_threshold -> Int4,
        /// Last counter mutation timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit trail of stock changes.
    inventory_log (id) {
        /// Monotonic row identifier.
        id -> Int8,
        /// Product whose counters changed.
        product_id -> Uuid,
        /// Total stock after the change.
        resulting_quantity -> Int4,
        /// Signed quantity of the change.
        quantity_delta -> Int4,
        /// Stable change-type string, e.g. `"Reserved"`.
        change_type -> Varchar,
        /// Identifier of the causing business record, usually an order.
        reference_id -> Nullable<Uuid>,
        /// Kind of the causing record, e.g. `"Order"`.
        reference_type -> Nullable<Varchar>,
        /// Free-text operator note.
        note -> Nullable<Text>,
        /// When the change was recorded.
        created_at -> Timestamptz,
        /// Staff member who performed the change, when known.
        actor_id -> Nullable<Uuid>,
    }
}

diesel::joinable!(inventory_log -> products (product_id));
diesel::allow_tables_to_appear_in_same_query!(products, inventory_log);
