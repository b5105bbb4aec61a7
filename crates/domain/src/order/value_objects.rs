//! Value objects for the order domain.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Money amount represented in cents to avoid floating point issues.
///
/// Decimal inputs are rounded to the nearest cent (midpoint away from zero)
/// on the way in; all arithmetic afterwards is checked integer arithmetic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars.saturating_mul(100),
        }
    }

    /// Creates a Money amount from a decimal, rounding to the nearest cent.
    pub fn from_decimal(amount: Decimal) -> Result<Self, OrderError> {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        (rounded * Decimal::ONE_HUNDRED)
            .to_i64()
            .map(Self::from_cents)
            .ok_or_else(|| OrderError::InvalidAmount(amount.to_string()))
    }

    /// Parses a decimal string such as `"12.345"` into cents, rounding to the
    /// nearest cent.
    pub fn parse(input: &str) -> Result<Self, OrderError> {
        let amount: Decimal = input
            .trim()
            .parse()
            .map_err(|_| OrderError::InvalidAmount(input.to_string()))?;
        Self::from_decimal(amount)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a two-decimal `Decimal`.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, failing if the result does not fit.
    pub fn multiply(&self, quantity: u32) -> Result<Money, OrderError> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Self::from_cents)
            .ok_or_else(|| OrderError::InvalidAmount(format!("{self} x {quantity}")))
    }

    /// Adds two amounts, failing if the result does not fit.
    pub fn checked_add(self, rhs: Money) -> Result<Money, OrderError> {
        self.cents
            .checked_add(rhs.cents)
            .map(Self::from_cents)
            .ok_or_else(|| OrderError::InvalidAmount(format!("{self} + {rhs}")))
    }

    /// Sums amounts, failing on the first addition that does not fit.
    pub fn try_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Result<Money, OrderError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}
