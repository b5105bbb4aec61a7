//! Order placement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{Actor, OrderId, Role, VariantId};
use domain::{Money, Order, OrderItem, StockLine, VariantRecord};
use notify::{Audience, Hub, Notification};
use order_store::OrderStore;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::ledger;
use crate::services::cache::Cache;

/// Cache key of the "store is accepting orders" flag.
pub const ACCEPT_ORDERS_KEY: &str = "feature:accept_orders";

const FLAG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// A customer's order request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<LineRequest>,
    pub delivery_address: String,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
    #[serde(default)]
    pub tip: Money,
}

impl OrderRequest {
    fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(CoreError::InvalidOrder("order has no items".to_string()));
        }
        if let Some(line) = self.items.iter().find(|l| l.quantity == 0) {
            return Err(CoreError::InvalidOrder(format!(
                "quantity for variant {} must be greater than 0",
                line.variant_id
            )));
        }
        if self.delivery_address.trim().is_empty() {
            return Err(CoreError::InvalidOrder(
                "delivery address is required".to_string(),
            ));
        }
        if self.tip.is_negative() {
            return Err(CoreError::InvalidOrder("tip cannot be negative".to_string()));
        }
        Ok(())
    }
}

/// Places orders: reserves stock, prices lines and records the order in one
/// transaction, then tells admins and drivers about it.
#[derive(Clone)]
pub struct Checkout<S: OrderStore> {
    store: S,
    hub: Arc<Hub>,
    cache: Arc<dyn Cache>,
}

impl<S: OrderStore> Checkout<S> {
    pub fn new(store: S, hub: Arc<Hub>, cache: Arc<dyn Cache>) -> Self {
        Self { store, hub, cache }
    }

    #[tracing::instrument(skip(self, request), fields(customer_id = %actor.user_id, items = request.items.len()))]
    pub async fn place_order(&self, actor: Actor, request: OrderRequest) -> Result<Order> {
        if actor.role != Role::Customer {
            return Err(CoreError::AccessDenied("only customers can place orders"));
        }
        if !self.accepting_orders().await {
            return Err(CoreError::OrdersPaused);
        }
        request.validate()?;

        let started = Instant::now();
        let order_id = OrderId::new();
        let lines: Vec<StockLine> = request
            .items
            .iter()
            .map(|l| StockLine::new(l.variant_id, l.quantity))
            .collect();

        let mut tx = self.store.begin().await?;
        let variants = ledger::reserve(tx.as_mut(), &lines).await?;
        let items = variants
            .iter()
            .zip(&lines)
            .map(|(variant, line)| OrderItem::snapshot(order_id, variant, line.quantity))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let order = Order::new_pending(
            order_id,
            actor.user_id,
            items,
            request.tip,
            request.delivery_address,
            request.delivery_instructions,
            Utc::now(),
        )?;
        tx.insert_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("orders_placed_total").increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(%order_id, total = %order.total(), "Order placed");

        self.hub.publish(
            &Notification::order_new(order.id, order.customer_id, order.total()),
            &Audience::role(Role::Admin),
        );
        self.hub.publish(
            &Notification::order_available(order.id, order.delivery_address.clone()),
            &Audience::role(Role::Driver),
        );

        Ok(order)
    }

    /// Whether new orders are accepted. An unset flag means yes, and so does
    /// an unreachable cache.
    pub async fn accepting_orders(&self) -> bool {
        match self.cache.get(ACCEPT_ORDERS_KEY).await {
            Ok(value) => value.as_deref() != Some("0"),
            Err(e) => {
                warn!(error = %e, "Could not read order intake flag, accepting orders");
                true
            }
        }
    }

    /// Creates or restocks a variant. Catalog data proper lives elsewhere;
    /// this only keeps the sellable record in step with it.
    #[tracing::instrument(skip(self, actor, variant), fields(variant_id = %variant.id))]
    pub async fn stock_variant(
        &self,
        actor: Actor,
        variant: VariantRecord,
    ) -> Result<VariantRecord> {
        if !actor.is_admin() {
            return Err(CoreError::AccessDenied("only admins can manage stock"));
        }
        if variant.stock < 0 || variant.price.is_negative() || variant.name.trim().is_empty() {
            return Err(CoreError::InvalidOrder(
                "variant needs a name, a price and non-negative stock".to_string(),
            ));
        }
        self.store.upsert_variant(&variant).await?;
        info!(stock = variant.stock, "Variant stocked");
        Ok(variant)
    }

    /// Opens or pauses order intake.
    pub async fn set_accepting_orders(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1" } else { "0" };
        self.cache
            .set(ACCEPT_ORDERS_KEY, value, Some(FLAG_TTL))
            .await?;
        info!(enabled, "Order intake flag updated");
        Ok(())
    }
}
