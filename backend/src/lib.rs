//! Cart-state cache and inventory-reservation subsystem.
//!
//! The crate keeps an active shopping cart's header and line items in a
//! Redis-backed cache, coordinates multi-key cache mutations as atomic
//! pipelines, and maintains a per-product stock ledger (counters plus an
//! append-only audit log) in PostgreSQL. Catalogue CRUD, order rows, payment
//! and user management live elsewhere and are reached only through the
//! domain ports.

pub mod domain;
pub mod outbound;
