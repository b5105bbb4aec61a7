//! Order and order item records.

use chrono::{DateTime, Utc};
use common::{DriverId, OrderId, OrderItemId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderStatus, OrderTotals};
use crate::inventory::{StockLine, VariantRecord};

/// A customer order.
///
/// Orders are never deleted: `Delivered`, `Cancelled` and `PaymentFailed`
/// are terminal statuses. Status changes go through [`Order::transition_to`]
/// (or [`Order::mark_payment_failed`] for the payment side-exit) so the
/// transition table is enforced wherever an order is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub totals: OrderTotals,
    pub delivery_address: String,
    pub delivery_instructions: Option<String>,
    /// Null until a driver claims the order; never cleared afterwards.
    pub driver_id: Option<DriverId>,
    pub payment_intent_id: Option<String>,
    pub delivery_photo_ref: Option<String>,
    pub delivery_notes: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// A line of an order with the price captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    /// Variant display name at order time.
    pub variant_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    /// Snapshots the variant's current name and price into a new line.
    pub fn snapshot(
        order_id: OrderId,
        variant: &VariantRecord,
        quantity: u32,
    ) -> Result<Self, OrderError> {
        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            variant_id: variant.id,
            variant_name: variant.name.clone(),
            quantity,
            unit_price: variant.price,
            line_total: variant.price.multiply(quantity)?,
        })
    }
}

impl Order {
    /// Builds a new `Pending` order from priced lines.
    pub fn new_pending(
        id: OrderId,
        customer_id: UserId,
        items: Vec<OrderItem>,
        tip: Money,
        delivery_address: impl Into<String>,
        delivery_instructions: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let delivery_address = delivery_address.into();
        if delivery_address.trim().is_empty() {
            return Err(OrderError::MissingDeliveryAddress);
        }

        let subtotal = Money::try_sum(items.iter().map(|item| item.line_total))?;
        let totals = OrderTotals::compute(subtotal, tip)?;

        Ok(Self {
            id,
            customer_id,
            status: OrderStatus::Pending,
            totals,
            delivery_address,
            delivery_instructions: delivery_instructions.filter(|s| !s.trim().is_empty()),
            driver_id: None,
            payment_intent_id: None,
            delivery_photo_ref: None,
            delivery_notes: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
            items,
        })
    }

    /// Moves the order to `target` if the transition table allows it.
    ///
    /// A supplied driver is recorded only when moving into `Delivering`.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        driver_id: Option<DriverId>,
        at: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        self.status.ensure_transition(target)?;

        if target == OrderStatus::Delivering
            && let Some(driver_id) = driver_id
        {
            self.driver_id = Some(driver_id);
        }
        if target == OrderStatus::Delivered {
            self.delivered_at = Some(at);
        }

        self.status = target;
        self.updated_at = at;
        Ok(())
    }

    /// Records a failed payment. Only a `Pending` order can fail payment.
    pub fn mark_payment_failed(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::PaymentFailed,
            });
        }
        self.status = OrderStatus::PaymentFailed;
        self.updated_at = at;
        Ok(())
    }

    /// Attaches proof of delivery.
    pub fn record_delivery_proof(&mut self, notes: Option<String>, photo_ref: Option<String>) {
        self.delivery_notes = notes.filter(|s| !s.trim().is_empty());
        self.delivery_photo_ref = photo_ref.filter(|s| !s.trim().is_empty());
    }

    pub fn total(&self) -> Money {
        self.totals.total()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.customer_id == user_id
    }

    /// Stock movements this order accounts for, in item order.
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine::new(item.variant_id, item.quantity))
            .collect()
    }
}
