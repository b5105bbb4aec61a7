//! Domain model for order lifecycle coordination.
//!
//! This crate is pure data and rules, with no I/O:
//! - `OrderStatus` and its transition table
//! - `Order` / `OrderItem` with monetary breakdown
//! - `Money` and `OrderTotals` (cent-exact pricing)
//! - inventory records and stock lines consumed by the ledger
//! - driver profiles and locations

pub mod driver;
pub mod inventory;
pub mod order;

pub use driver::{Driver, GeoPoint};
pub use inventory::{StockLine, VariantRecord};
pub use order::{
    MIN_CHARGE_CENTS, Money, Order, OrderError, OrderItem, OrderStatus, OrderTotals,
    ParseStatusError,
};
