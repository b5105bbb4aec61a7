//! Order pricing: flat, tip-only model.

use serde::{Deserialize, Serialize};

use super::{Money, OrderError};

/// Smallest amount the payment provider will charge, in cents.
pub const MIN_CHARGE_CENTS: i64 = 50;

/// Monetary breakdown of an order.
///
/// Only constructed through [`OrderTotals::compute`], which guarantees
/// `total == subtotal + tip` with tax and delivery fee fixed at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    subtotal: Money,
    tip: Money,
    tax: Money,
    delivery_fee: Money,
    total: Money,
}

impl OrderTotals {
    pub fn compute(subtotal: Money, tip: Money) -> Result<Self, OrderError> {
        if subtotal.is_negative() {
            return Err(OrderError::NegativeAmount { field: "Subtotal" });
        }
        if tip.is_negative() {
            return Err(OrderError::NegativeAmount { field: "Tip" });
        }

        Ok(Self {
            subtotal,
            tip,
            tax: Money::zero(),
            delivery_fee: Money::zero(),
            total: subtotal.checked_add(tip)?,
        })
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tip(&self) -> Money {
        self.tip
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns the amount to charge in cents, rejecting totals under
    /// [`MIN_CHARGE_CENTS`].
    pub fn charge_cents(&self) -> Result<i64, OrderError> {
        let cents = self.total.cents();
        if cents < MIN_CHARGE_CENTS {
            return Err(OrderError::BelowMinimumCharge { cents });
        }
        Ok(cents)
    }
}
