//! Customer and staff order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{DriverId, OrderId, OrderItemId, Role, UserId, VariantId};
use domain::{Order, OrderItem, OrderStatus};
use fulfillment::OrderRequest;
use order_store::{OrderFilter, OrderStore};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    pub driver_id: Option<DriverId>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tip_cents: i64,
    pub tax_cents: i64,
    pub delivery_fee_cents: i64,
    pub total_cents: i64,
    pub delivery_address: String,
    pub delivery_instructions: Option<String>,
    pub driver_id: Option<DriverId>,
    pub payment_intent_id: Option<String>,
    pub delivery_notes: Option<String>,
    pub delivery_photo_ref: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    pub variant_id: VariantId,
    pub variant_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            variant_id: item.variant_id,
            variant_name: item.variant_name,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            subtotal_cents: order.totals.subtotal().cents(),
            tip_cents: order.totals.tip().cents(),
            tax_cents: order.totals.tax().cents(),
            delivery_fee_cents: order.totals.delivery_fee().cents(),
            total_cents: order.totals.total().cents(),
            delivery_address: order.delivery_address,
            delivery_instructions: order.delivery_instructions,
            driver_id: order.driver_id,
            payment_intent_id: order.payment_intent_id,
            delivery_notes: order.delivery_notes,
            delivery_photo_ref: order.delivery_photo_ref,
            delivered_at: order.delivered_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: order.items.into_iter().map(Into::into).collect(),
        }
    }
}

pub(crate) fn to_responses(orders: Vec<Order>) -> Vec<OrderResponse> {
    orders.into_iter().map(Into::into).collect()
}

// -- Handlers --

/// POST /orders: place an order for the calling customer.
#[tracing::instrument(skip_all)]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let actor = identity.require(Role::Customer, "only customers can place orders")?;
    let order = state.checkout.place_order(actor, req).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: list orders; customers only ever see their own.
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let mut filter = OrderFilter::new().page(
        query.limit.unwrap_or(20),
        query.offset.unwrap_or(0),
    );
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    let orders = state.lifecycle.list_orders(actor, filter).await?;
    Ok(Json(to_responses(orders)))
}

/// GET /orders/{id}
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.lifecycle.get_order(id, actor).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, actor))]
pub async fn cancel<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.lifecycle.cancel(id, actor).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/status: staff transition.
#[tracing::instrument(skip(state, identity, req), fields(status = %req.status))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = identity.require_staff()?;
    let order = state
        .lifecycle
        .transition(id, req.status, req.driver_id, actor)
        .await?;
    Ok(Json(order.into()))
}
