//! Payment intent and webhook endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use common::{OrderId, Role};
use fulfillment::{IntentReceipt, PaymentEvent, ReconcileOutcome};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;
use crate::signature::SIGNATURE_HEADER;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    pub order_id: OrderId,
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// POST /payments/intents
#[tracing::instrument(skip(state, identity, req), fields(order_id = %req.order_id))]
pub async fn create_intent<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<IntentRequest>,
) -> Result<Json<IntentReceipt>, ApiError> {
    let actor = identity.require(Role::Customer, "only customers can pay for orders")?;
    let receipt = state
        .payments
        .open_intent(req.order_id, req.amount_cents, actor)
        .await?;
    Ok(Json(receipt))
}

/// POST /payments/webhook: provider callback signed over the raw body.
///
/// Unknown intents are acknowledged so the provider stops redelivering.
pub async fn webhook<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let verifier = state
        .webhook
        .as_ref()
        .ok_or(ApiError::NotConfigured("payment webhooks are not configured"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = verifier.verify(&body, signature) {
        warn!(reason = err.message(), "Rejected payment webhook");
        metrics::counter!("payment_webhooks_total", "outcome" => "rejected").increment(1);
        return Err(ApiError::InvalidSignature(err));
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook body: {e}")))?;
    let outcome = state.payments.reconcile(&event).await?;
    let outcome = match outcome {
        ReconcileOutcome::Applied(_) => "applied",
        ReconcileOutcome::Unchanged { .. } => "unchanged",
        ReconcileOutcome::UnknownIntent => "unknown_intent",
        ReconcileOutcome::Ignored => "ignored",
    };
    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
