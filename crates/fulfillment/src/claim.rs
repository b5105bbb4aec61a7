//! Driver claims on orders.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, UserId};
use domain::{Order, OrderStatus};
use notify::{Audience, Hub, Notification};
use order_store::{OrderFilter, OrderStore};
use tracing::{debug, info};

use crate::announce;
use crate::error::{CoreError, Result};

const AVAILABLE_PAGE: usize = 20;

/// Assigns orders to drivers, at most one driver per order.
///
/// Mutual exclusion comes from the store's conditional update, so it holds
/// across any number of processes sharing the database.
#[derive(Clone)]
pub struct ClaimService<S: OrderStore> {
    store: S,
    hub: Arc<Hub>,
}

impl<S: OrderStore> ClaimService<S> {
    pub fn new(store: S, hub: Arc<Hub>) -> Self {
        Self { store, hub }
    }

    /// Claims an order for the driver linked to `driver_user_id`.
    ///
    /// On success the order is `Delivering` with this driver assigned. A
    /// losing driver gets `AlreadyClaimed` when another driver holds the
    /// order, or `NoLongerAvailable` when it has moved past claimability.
    #[tracing::instrument(skip(self))]
    pub async fn claim(&self, order_id: OrderId, driver_user_id: UserId) -> Result<Order> {
        let driver = self
            .store
            .driver_by_user(driver_user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", driver_user_id))?;

        if !driver.available {
            metrics::counter!("order_claims_total", "outcome" => "driver_unavailable").increment(1);
            return Err(CoreError::DriverUnavailable);
        }

        let claimed = self
            .store
            .claim_order(order_id, driver.id, &OrderStatus::CLAIMABLE, Utc::now())
            .await?;

        let Some(order) = claimed else {
            let err = self.classify_miss(order_id).await?;
            let outcome = match err {
                CoreError::AlreadyClaimed { .. } => "already_claimed",
                CoreError::NoLongerAvailable { .. } => "no_longer_available",
                _ => "not_found",
            };
            metrics::counter!("order_claims_total", "outcome" => outcome).increment(1);
            debug!(%order_id, outcome, "Claim lost");
            return Err(err);
        };

        metrics::counter!("order_claims_total", "outcome" => "claimed").increment(1);
        info!(%order_id, driver_id = %driver.id, "Order claimed");

        announce::order_updated(&self.hub, &order, Some(driver.user_id));
        self.hub.publish(
            &Notification::order_assigned(order.id, order.delivery_address.clone()),
            &Audience::user(driver.user_id),
        );
        Ok(order)
    }

    /// Re-reads an order after a claim matched no row and explains why.
    async fn classify_miss(&self, order_id: OrderId) -> Result<CoreError> {
        let err = match self.store.get_order(order_id).await? {
            None => CoreError::not_found("Order", order_id),
            Some(order) if order.driver_id.is_some() => CoreError::AlreadyClaimed { order_id },
            Some(order) => CoreError::NoLongerAvailable {
                order_id,
                status: order.status,
            },
        };
        Ok(err)
    }

    /// Ready orders nobody has claimed yet, oldest first.
    pub async fn available_orders(&self) -> Result<Vec<Order>> {
        let filter = OrderFilter::new()
            .with_status(OrderStatus::Ready)
            .unassigned()
            .oldest_first()
            .page(AVAILABLE_PAGE, 0);
        Ok(self.store.list_orders(filter).await?)
    }

    /// Orders the driver is currently delivering.
    pub async fn active_orders(&self, driver_user_id: UserId) -> Result<Vec<Order>> {
        let driver = self
            .store
            .driver_by_user(driver_user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Driver", driver_user_id))?;

        let filter = OrderFilter::new()
            .for_driver(driver.id)
            .with_status(OrderStatus::Delivering)
            .oldest_first()
            .page(order_store::MAX_PAGE_SIZE, 0);
        Ok(self.store.list_orders(filter).await?)
    }
}
