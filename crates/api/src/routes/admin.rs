//! Admin endpoints: order intake flag and stock.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Role, VariantId};
use domain::{Money, VariantRecord};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

const ADMINS_ONLY: &str = "admin role required";

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptOrdersFlag {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    pub name: String,
    pub stock: i64,
    pub price_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantResponse {
    pub id: VariantId,
    pub name: String,
    pub stock: i64,
    pub price_cents: i64,
}

/// GET /admin/features/accept-orders
pub async fn accept_orders<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<AcceptOrdersFlag>, ApiError> {
    identity.require(Role::Admin, ADMINS_ONLY)?;
    Ok(Json(AcceptOrdersFlag {
        enabled: state.checkout.accepting_orders().await,
    }))
}

/// POST /admin/features/accept-orders
#[tracing::instrument(skip(state, identity), fields(enabled = flag.enabled))]
pub async fn set_accept_orders<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(flag): Json<AcceptOrdersFlag>,
) -> Result<Json<AcceptOrdersFlag>, ApiError> {
    identity.require(Role::Admin, ADMINS_ONLY)?;
    state.checkout.set_accepting_orders(flag.enabled).await?;
    Ok(Json(flag))
}

/// PUT /admin/variants/{id}
pub async fn stock_variant<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<VariantId>,
    Json(req): Json<StockRequest>,
) -> Result<Json<VariantResponse>, ApiError> {
    let actor = identity.require(Role::Admin, ADMINS_ONLY)?;
    let variant = VariantRecord::new(id, req.name, req.stock, Money::from_cents(req.price_cents));
    let variant = state.checkout.stock_variant(actor, variant).await?;
    Ok(Json(VariantResponse {
        id: variant.id,
        name: variant.name,
        stock: variant.stock,
        price_cents: variant.price.cents(),
    }))
}
