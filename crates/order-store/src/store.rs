use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DriverId, OrderId, UserId, VariantId};
use domain::{Driver, GeoPoint, Order, OrderStatus, VariantRecord};

use crate::Result;

/// Upper bound on rows returned by a single listing.
pub const MAX_PAGE_SIZE: usize = 50;

/// Filter for order listings.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub customer_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub driver_id: Option<DriverId>,
    /// Only orders with no driver assigned.
    pub unassigned_only: bool,
    /// Sort by creation time ascending instead of newest first.
    pub oldest_first: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            customer_id: None,
            status: None,
            driver_id: None,
            unassigned_only: false,
            oldest_first: false,
            limit: 20,
            offset: 0,
        }
    }
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_driver(mut self, driver_id: DriverId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.unassigned_only = true;
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    /// Sets the page; the limit is clamped to [`MAX_PAGE_SIZE`].
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit.clamp(1, MAX_PAGE_SIZE);
        self.offset = offset;
        self
    }

    /// Returns true if `order` passes every predicate of the filter.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(customer_id) = self.customer_id
            && order.customer_id != customer_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(driver_id) = self.driver_id
            && order.driver_id != Some(driver_id)
        {
            return false;
        }
        !(self.unassigned_only && order.driver_id.is_some())
    }
}

/// One unit of work against the store.
///
/// Reads made through a transaction lock the rows they return until the
/// transaction ends. Dropping a transaction without calling
/// [`StoreTx::commit`] rolls back every write made through it, so an early
/// return via `?` can never leave partial state behind.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads and locks the given variant rows, taking the locks in id order
    /// so that concurrent reservations over the same variants cannot
    /// deadlock. Unknown ids are absent from the result.
    async fn variants_for_update(
        &mut self,
        ids: &[VariantId],
    ) -> Result<HashMap<VariantId, VariantRecord>>;

    /// Adds `delta` (which may be negative) to a variant's stock.
    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<()>;

    /// Inserts a new order together with its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Reads and locks an order row.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads and locks the order carrying the given payment intent.
    async fn order_by_intent_for_update(&mut self, intent_id: &str) -> Result<Option<Order>>;

    /// Writes the mutable order fields (status, driver, payment intent,
    /// delivery proof and timestamps). Items are immutable and not rewritten.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage for orders, inventory and drivers.
///
/// All implementations must be thread-safe (Send + Sync). Atomicity for
/// shared counters (stock, order status) comes from the storage engine, never
/// from locks held by callers.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Starts a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Loads an order with its items.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching a filter.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Assigns `driver_id` and moves the order to `Delivering` in a single
    /// conditional update, only if the order is in one of `claimable` and has
    /// no driver yet.
    ///
    /// Returns the updated order, or `None` if the condition did not match.
    async fn claim_order(
        &self,
        id: OrderId,
        driver_id: DriverId,
        claimable: &[OrderStatus],
        at: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Stores the payment intent id on an order that is still `Pending` and
    /// has no intent yet.
    ///
    /// Returns the updated order, or `None` if the condition did not match.
    async fn attach_payment_intent(
        &self,
        id: OrderId,
        intent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>>;

    /// Inserts or replaces a variant record.
    async fn upsert_variant(&self, variant: &VariantRecord) -> Result<()>;

    async fn get_driver(&self, id: DriverId) -> Result<Option<Driver>>;

    async fn driver_by_user(&self, user_id: UserId) -> Result<Option<Driver>>;

    /// Inserts or replaces a driver profile.
    async fn upsert_driver(&self, driver: &Driver) -> Result<()>;

    /// Updates the availability flag of the driver linked to `user_id`.
    async fn set_driver_availability(
        &self,
        user_id: UserId,
        available: bool,
    ) -> Result<Option<Driver>>;

    /// Updates the last known location of the driver linked to `user_id`.
    async fn set_driver_location(&self, user_id: UserId, point: GeoPoint)
    -> Result<Option<Driver>>;
}
