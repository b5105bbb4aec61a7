//! Order state machine: guarded status transitions with side effects.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, DriverId, OrderId, Role, UserId};
use domain::{Order, OrderStatus};
use notify::Hub;
use order_store::{OrderFilter, OrderStore};
use tracing::info;

use crate::error::{CoreError, Result};
use crate::{announce, ledger};

/// Decides whether `actor` may move `order` to `target`.
///
/// Customers may only cancel their own orders, and only before the order is
/// ready. Drivers and admins may apply any transition the table allows.
/// Terminal orders are left to the transition table so the caller sees
/// `InvalidTransition`.
fn authorize(order: &Order, target: OrderStatus, actor: &Actor) -> Result<()> {
    if actor.role != Role::Customer {
        return Ok(());
    }
    if !order.is_owned_by(actor.user_id) {
        return Err(CoreError::AccessDenied("order belongs to another customer"));
    }
    if target != OrderStatus::Cancelled {
        return Err(CoreError::AccessDenied("customers can only cancel orders"));
    }
    if !order.status.is_terminal() && !order.status.customer_can_cancel() {
        return Err(CoreError::CancellationWindowClosed {
            status: order.status,
        });
    }
    Ok(())
}

/// Applies status changes to orders.
///
/// Every change reads the order under a row lock in the same transaction as
/// the write, and publishes `order:updated` only after the commit.
#[derive(Clone)]
pub struct OrderLifecycle<S: OrderStore> {
    store: S,
    hub: Arc<Hub>,
}

impl<S: OrderStore> OrderLifecycle<S> {
    pub fn new(store: S, hub: Arc<Hub>) -> Self {
        Self { store, hub }
    }

    /// Moves an order to `target` on behalf of `actor`.
    ///
    /// `driver_id` is recorded when the target is `Delivering`. Cancelling
    /// returns every item's quantity to stock in the same transaction.
    #[tracing::instrument(skip(self, actor), fields(role = %actor.role))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        driver_id: Option<DriverId>,
        actor: Actor,
    ) -> Result<Order> {
        if target == OrderStatus::Delivering
            && let Some(driver_id) = driver_id
            && self.store.get_driver(driver_id).await?.is_none()
        {
            return Err(CoreError::not_found("Driver", driver_id));
        }

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        authorize(&order, target, &actor)?;

        let from = order.status;
        order.transition_to(target, driver_id, Utc::now())?;
        if target == OrderStatus::Cancelled {
            ledger::restore(tx.as_mut(), &order.stock_lines()).await?;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("order_transitions_total", "to" => target.as_str()).increment(1);
        info!(%order_id, %from, "Order transitioned");

        let driver_user = announce::driver_user(&self.store, &order).await;
        announce::order_updated(&self.hub, &order, driver_user);
        Ok(order)
    }

    /// Cancels an order, restoring its stock.
    pub async fn cancel(&self, order_id: OrderId, actor: Actor) -> Result<Order> {
        self.transition(order_id, OrderStatus::Cancelled, None, actor)
            .await
    }

    /// Marks an order delivered by the driver it is assigned to, attaching
    /// proof of delivery.
    #[tracing::instrument(skip(self, notes, photo_ref))]
    pub async fn complete_delivery(
        &self,
        order_id: OrderId,
        driver_user_id: UserId,
        notes: Option<String>,
        photo_ref: Option<String>,
    ) -> Result<Order> {
        let driver = self
            .store
            .driver_by_user(driver_user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", driver_user_id))?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        if order.driver_id != Some(driver.id) {
            return Err(CoreError::AccessDenied("order is not assigned to this driver"));
        }

        order.transition_to(OrderStatus::Delivered, None, Utc::now())?;
        order.record_delivery_proof(notes, photo_ref);
        tx.update_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("order_transitions_total", "to" => OrderStatus::Delivered.as_str())
            .increment(1);
        info!(%order_id, driver_id = %driver.id, "Order delivered");

        announce::order_updated(&self.hub, &order, Some(driver.user_id));
        Ok(order)
    }

    /// Loads an order visible to `actor`.
    pub async fn get_order(&self, order_id: OrderId, actor: Actor) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        if !actor.can_view(order.customer_id) {
            return Err(CoreError::AccessDenied("order belongs to another customer"));
        }
        Ok(order)
    }

    /// Lists orders; customers are always restricted to their own.
    pub async fn list_orders(&self, actor: Actor, mut filter: OrderFilter) -> Result<Vec<Order>> {
        if actor.role == Role::Customer {
            filter.customer_id = Some(actor.user_id);
        }
        Ok(self.store.list_orders(filter).await?)
    }
}
