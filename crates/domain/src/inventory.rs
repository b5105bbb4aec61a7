//! Inventory records and stock movements.

use common::VariantId;
use serde::{Deserialize, Serialize};

use crate::Money;

/// Stock and price of one catalog variant.
///
/// `stock` is never negative; the ledger checks sufficiency before every
/// decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub name: String,
    pub stock: i64,
    pub price: Money,
}

impl VariantRecord {
    pub fn new(id: VariantId, name: impl Into<String>, stock: i64, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            stock,
            price,
        }
    }

    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= i64::from(quantity)
    }
}

/// A requested quantity of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }

    /// The quantity as a signed stock delta.
    pub fn delta(&self) -> i64 {
        i64::from(self.quantity)
    }
}
