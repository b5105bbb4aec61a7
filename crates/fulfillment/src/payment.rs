//! Payment intent creation and webhook reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{Actor, OrderId};
use domain::{Order, OrderStatus};
use notify::Hub;
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::services::payment::PaymentProvider;
use crate::{announce, ledger};

const CURRENCY: &str = "usd";

/// What the client needs to confirm a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentReceipt {
    pub intent_id: String,
    pub client_secret: String,
    pub amount_cents: i64,
}

/// Kind of a payment provider webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PaymentEventKind {
    #[serde(rename = "payment_intent.succeeded")]
    Succeeded,
    #[serde(rename = "payment_intent.payment_failed")]
    Failed,
    /// Any event type this service does not act on.
    #[serde(other)]
    Other,
}

/// A payment provider webhook whose signature the caller has verified.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub kind: PaymentEventKind,
    pub intent_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Result of applying a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order moved to a new status.
    Applied(Order),
    /// The order had already left `Pending`; nothing changed.
    Unchanged { order_id: OrderId, status: OrderStatus },
    /// No order carries this intent.
    UnknownIntent,
    /// The event type is not one this service handles.
    Ignored,
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied(_) => "applied",
            ReconcileOutcome::Unchanged { .. } => "unchanged",
            ReconcileOutcome::UnknownIntent => "unknown_intent",
            ReconcileOutcome::Ignored => "ignored",
        }
    }
}

/// Bridges orders and the payment provider.
///
/// Without a provider, opening an intent fails with `PaymentUnavailable`;
/// webhooks are still reconciled.
#[derive(Clone)]
pub struct PaymentCoordinator<S: OrderStore> {
    store: S,
    hub: Arc<Hub>,
    provider: Option<Arc<dyn PaymentProvider>>,
}

impl<S: OrderStore> PaymentCoordinator<S> {
    pub fn new(store: S, hub: Arc<Hub>, provider: Option<Arc<dyn PaymentProvider>>) -> Self {
        Self {
            store,
            hub,
            provider,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Creates a payment intent for the order's server-computed total.
    ///
    /// `amount_cents`, when supplied by the client, must equal that total.
    /// An order holds at most one intent: once attached, later calls return
    /// that same intent instead of creating another.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn open_intent(
        &self,
        order_id: OrderId,
        amount_cents: Option<i64>,
        actor: Actor,
    ) -> Result<IntentReceipt> {
        let provider = self.provider.as_ref().ok_or(CoreError::PaymentUnavailable)?;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        if !order.is_owned_by(actor.user_id) {
            return Err(CoreError::AccessDenied("order belongs to another customer"));
        }
        if order.status != OrderStatus::Pending {
            return Err(CoreError::OrderNotPayable {
                status: order.status,
            });
        }

        let expected_cents = order.total().cents();
        if let Some(provided_cents) = amount_cents
            && provided_cents != expected_cents
        {
            return Err(CoreError::AmountMismatch {
                expected_cents,
                provided_cents,
            });
        }
        let amount_cents = order.totals.charge_cents()?;

        if let Some(existing) = &order.payment_intent_id {
            return self
                .reuse_intent(provider.as_ref(), order_id, existing, amount_cents)
                .await;
        }

        let metadata = HashMap::from([
            ("orderId".to_string(), order.id.to_string()),
            ("userId".to_string(), order.customer_id.to_string()),
        ]);
        let intent = provider
            .create_intent(amount_cents, CURRENCY, metadata)
            .await?;

        let attached = self
            .store
            .attach_payment_intent(order.id, &intent.id, Utc::now())
            .await?;
        if attached.is_none() {
            let current = self.store.get_order(order.id).await?;
            if let Some(current) = &current
                && current.status == OrderStatus::Pending
                && let Some(existing) = &current.payment_intent_id
            {
                warn!(
                    %order_id,
                    discarded_intent = %intent.id,
                    "Order gained a payment intent concurrently"
                );
                return self
                    .reuse_intent(provider.as_ref(), order_id, existing, amount_cents)
                    .await;
            }
            let status = current.map_or(order.status, |o| o.status);
            return Err(CoreError::OrderNotPayable { status });
        }

        info!(%order_id, intent_id = %intent.id, amount_cents, "Payment intent opened");
        Ok(IntentReceipt {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents,
        })
    }

    async fn reuse_intent(
        &self,
        provider: &dyn PaymentProvider,
        order_id: OrderId,
        intent_id: &str,
        amount_cents: i64,
    ) -> Result<IntentReceipt> {
        let intent = provider.retrieve_intent(intent_id).await?;
        info!(%order_id, intent_id, "Payment intent reused");
        Ok(IntentReceipt {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents,
        })
    }

    /// Applies a payment webhook to the order carrying its intent.
    ///
    /// Only a `Pending` order is changed, so redelivered webhooks are no-ops.
    /// A failed payment restores the order's stock in the same transaction.
    #[tracing::instrument(skip(self, event), fields(kind = ?event.kind, intent_id = %event.intent_id))]
    pub async fn reconcile(&self, event: &PaymentEvent) -> Result<ReconcileOutcome> {
        let outcome = self.apply(event).await?;
        metrics::counter!("payment_webhooks_total", "outcome" => outcome.label()).increment(1);

        match &outcome {
            ReconcileOutcome::Applied(order) => {
                info!(order_id = %order.id, status = %order.status, "Payment reconciled");
                let driver_user = announce::driver_user(&self.store, order).await;
                announce::order_updated(&self.hub, order, driver_user);
            }
            ReconcileOutcome::UnknownIntent => {
                warn!(metadata = ?event.metadata, "Webhook for unknown payment intent");
            }
            ReconcileOutcome::Unchanged { order_id, status } => {
                info!(%order_id, %status, "Webhook replay ignored");
            }
            ReconcileOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    async fn apply(&self, event: &PaymentEvent) -> Result<ReconcileOutcome> {
        let succeeded = match event.kind {
            PaymentEventKind::Succeeded => true,
            PaymentEventKind::Failed => false,
            PaymentEventKind::Other => return Ok(ReconcileOutcome::Ignored),
        };

        let mut tx = self.store.begin().await?;
        let Some(mut order) = tx.order_by_intent_for_update(&event.intent_id).await? else {
            return Ok(ReconcileOutcome::UnknownIntent);
        };

        if order.status != OrderStatus::Pending {
            return Ok(ReconcileOutcome::Unchanged {
                order_id: order.id,
                status: order.status,
            });
        }

        let now = Utc::now();
        if succeeded {
            order.transition_to(OrderStatus::Processing, None, now)?;
        } else {
            order.mark_payment_failed(now)?;
            ledger::restore(tx.as_mut(), &order.stock_lines()).await?;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        Ok(ReconcileOutcome::Applied(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_body_parses() {
        let body = serde_json::json!({
            "type": "payment_intent.succeeded",
            "intentId": "pi_000001",
            "metadata": {"orderId": "abc"}
        });
        let event: PaymentEvent = serde_json::from_value(body).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Succeeded);
        assert_eq!(event.intent_id, "pi_000001");
        assert_eq!(event.metadata.get("orderId").map(String::as_str), Some("abc"));
    }

    #[test]
    fn unknown_webhook_types_are_other() {
        let body = serde_json::json!({
            "type": "charge.refunded",
            "intentId": "pi_000001"
        });
        let event: PaymentEvent = serde_json::from_value(body).unwrap();
        assert_eq!(event.kind, PaymentEventKind::Other);
        assert!(event.metadata.is_empty());
    }

    #[test]
    fn receipt_serializes_camel_case() {
        let receipt = IntentReceipt {
            intent_id: "pi_1".to_string(),
            client_secret: "pi_1_secret".to_string(),
            amount_cents: 2200,
        };
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value["intentId"], "pi_1");
        assert_eq!(value["clientSecret"], "pi_1_secret");
        assert_eq!(value["amountCents"], 2200);
    }
}
