//! Driver endpoints: profile, availability, location and claims.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Actor, DriverId, OrderId, Role, UserId};
use domain::{Driver, GeoPoint};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use super::orders::{OrderResponse, to_responses};
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

const DRIVERS_ONLY: &str = "driver role required";

fn driver(identity: Identity) -> Result<Actor, ApiError> {
    identity.require(Role::Driver, DRIVERS_ONLY)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub vehicle_type: String,
    pub license_plate: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub delivery_notes: Option<String>,
    pub delivery_photo_ref: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverResponse {
    pub id: DriverId,
    pub user_id: UserId,
    pub available: bool,
    pub vehicle_type: String,
    pub license_plate: String,
    pub location: Option<GeoPoint>,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        Self {
            id: driver.id,
            user_id: driver.user_id,
            available: driver.available,
            vehicle_type: driver.vehicle_type,
            license_plate: driver.license_plate,
            location: driver.location,
        }
    }
}

/// GET /driver/profile
pub async fn profile<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<DriverResponse>, ApiError> {
    let actor = driver(identity)?;
    let profile = state.drivers.profile(actor.user_id).await?;
    Ok(Json(profile.into()))
}

/// PUT /driver/profile
pub async fn register<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<DriverResponse>, ApiError> {
    let actor = driver(identity)?;
    let profile = state
        .drivers
        .register(actor.user_id, req.vehicle_type, req.license_plate)
        .await?;
    Ok(Json(profile.into()))
}

/// PATCH /driver/availability
pub async fn set_availability<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<DriverResponse>, ApiError> {
    let actor = driver(identity)?;
    let profile = state
        .drivers
        .set_availability(actor.user_id, req.available)
        .await?;
    Ok(Json(profile.into()))
}

/// POST /driver/location
pub async fn update_location<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Json(req): Json<LocationRequest>,
) -> Result<Json<DriverResponse>, ApiError> {
    let actor = driver(identity)?;
    let profile = state
        .drivers
        .update_location(actor.user_id, req.lat, req.lng)
        .await?;
    Ok(Json(profile.into()))
}

/// GET /driver/orders/available
pub async fn available<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    driver(identity)?;
    let orders = state.claims.available_orders().await?;
    Ok(Json(to_responses(orders)))
}

/// GET /driver/orders/active
pub async fn active<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let actor = driver(identity)?;
    let orders = state.claims.active_orders(actor.user_id).await?;
    Ok(Json(to_responses(orders)))
}

/// POST /driver/orders/{id}/accept
#[tracing::instrument(skip(state, identity))]
pub async fn accept<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = driver(identity)?;
    let order = state.claims.claim(id, actor.user_id).await?;
    Ok(Json(order.into()))
}

/// POST /driver/orders/{id}/complete
#[tracing::instrument(skip(state, identity, req))]
pub async fn complete<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    identity: Identity,
    Path(id): Path<OrderId>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let actor = driver(identity)?;
    let order = state
        .lifecycle
        .complete_delivery(id, actor.user_id, req.delivery_notes, req.delivery_photo_ref)
        .await?;
    Ok(Json(order.into()))
}
