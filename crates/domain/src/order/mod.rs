//! Order model and related types.

mod model;
mod status;
mod totals;
mod value_objects;

pub use model::{Order, OrderItem};
pub use status::{OrderStatus, ParseStatusError};
pub use totals::{MIN_CHARGE_CENTS, OrderTotals};
pub use value_objects::Money;

use thiserror::Error;

/// Errors raised by order rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status is not reachable from the current one.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Quantity must be a positive integer.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Delivery address is blank.
    #[error("Delivery address is required")]
    MissingDeliveryAddress,

    /// A monetary component is negative.
    #[error("{field} cannot be negative")]
    NegativeAmount { field: &'static str },

    /// A money amount could not be parsed or does not fit in cents.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The chargeable total is under the provider minimum.
    #[error("Amount {cents} cents is below the minimum charge of {min} cents", min = MIN_CHARGE_CENTS)]
    BelowMinimumCharge { cents: i64 },
}
