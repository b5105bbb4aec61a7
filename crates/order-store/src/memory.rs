use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DriverId, OrderId, UserId, VariantId};
use domain::{Driver, GeoPoint, Order, OrderStatus, VariantRecord};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{OrderFilter, OrderStore, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    variants: HashMap<VariantId, VariantRecord>,
    drivers: HashMap<DriverId, Driver>,
}

impl Tables {
    fn driver_by_user_mut(&mut self, user_id: UserId) -> Option<&mut Driver> {
        self.drivers.values_mut().find(|d| d.user_id == user_id)
    }
}

/// In-memory order store for tests and single-process deployments.
///
/// Transactions take the whole store lock for their lifetime and work on a
/// private copy of the tables, which replaces the shared tables on commit.
/// This gives the same all-or-nothing and mutual-exclusion guarantees as the
/// PostgreSQL row locks, at table granularity.
///
/// Calling a non-transactional method while holding a transaction on the
/// same task deadlocks.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        *self.tables.lock().await = Tables::default();
    }
}

/// Transaction over an [`InMemoryOrderStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn variants_for_update(
        &mut self,
        ids: &[VariantId],
    ) -> Result<HashMap<VariantId, VariantRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.variants.get(id).map(|v| (*id, v.clone())))
            .collect())
    }

    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<()> {
        let variant = self
            .working
            .variants
            .get_mut(&id)
            .ok_or_else(|| StoreError::Constraint(format!("variant {id} does not exist")))?;

        let next = variant.stock + delta;
        if next < 0 {
            return Err(StoreError::Constraint(format!(
                "stock for variant {id} cannot go below zero"
            )));
        }
        variant.stock = next;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Constraint(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn order_by_intent_for_update(&mut self, intent_id: &str) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::Constraint(format!("order {} does not exist", order.id)))?;

        stored.status = order.status;
        stored.driver_id = order.driver_id;
        stored.payment_intent_id = order.payment_intent_id.clone();
        stored.delivery_photo_ref = order.delivery_photo_ref.clone();
        stored.delivery_notes = order.delivery_notes.clone();
        stored.delivered_at = order.delivered_at;
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;

        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            let by_time = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            if filter.oldest_first {
                by_time
            } else {
                by_time.reverse()
            }
        });

        Ok(orders
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn claim_order(
        &self,
        id: OrderId,
        driver_id: DriverId,
        claimable: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut tables = self.tables.lock().await;

        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        if !claimable.contains(&order.status) || order.driver_id.is_some() {
            return Ok(None);
        }

        order.driver_id = Some(driver_id);
        order.status = OrderStatus::Delivering;
        order.updated_at = at;
        Ok(Some(order.clone()))
    }

    async fn attach_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut tables = self.tables.lock().await;

        let taken = tables
            .orders
            .values()
            .any(|o| o.id != id && o.payment_intent_id.as_deref() == Some(intent_id));
        if taken {
            return Err(StoreError::Constraint(format!(
                "payment intent {intent_id} is attached to another order"
            )));
        }

        let Some(order) = tables.orders.get_mut(&id) else {
            return Ok(None);
        };
        if order.status != OrderStatus::Pending || order.payment_intent_id.is_some() {
            return Ok(None);
        }

        order.payment_intent_id = Some(intent_id.to_string());
        order.updated_at = at;
        Ok(Some(order.clone()))
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>> {
        Ok(self.tables.lock().await.variants.get(&id).cloned())
    }

    async fn upsert_variant(&self, variant: &VariantRecord) -> Result<()> {
        if variant.stock < 0 {
            return Err(StoreError::Constraint(format!(
                "stock for variant {} cannot go below zero",
                variant.id
            )));
        }
        self.tables
            .lock()
            .await
            .variants
            .insert(variant.id, variant.clone());
        Ok(())
    }

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>> {
        Ok(self.tables.lock().await.drivers.get(&id).cloned())
    }

    async fn driver_by_user(&self, user_id: UserId) -> Result<Option<Driver>> {
        Ok(self
            .tables
            .lock()
            .await
            .drivers
            .values()
            .find(|d| d.user_id == user_id)
            .cloned())
    }

    async fn upsert_driver(&self, driver: &Driver) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let conflict = tables
            .drivers
            .values()
            .any(|d| d.user_id == driver.user_id && d.id != driver.id);
        if conflict {
            return Err(StoreError::Constraint(format!(
                "user {} already has a driver profile",
                driver.user_id
            )));
        }
        tables.drivers.insert(driver.id, driver.clone());
        Ok(())
    }

    async fn set_driver_availability(
        &self,
        user_id: UserId,
        available: bool,
    ) -> Result<Option<Driver>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.driver_by_user_mut(user_id).map(|driver| {
            driver.available = available;
            driver.clone()
        }))
    }

    async fn set_driver_location(
        &self,
        user_id: UserId,
        point: GeoPoint,
    ) -> Result<Option<Driver>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.driver_by_user_mut(user_id).map(|driver| {
            driver.location = Some(point);
            driver.clone()
        }))
    }
}
