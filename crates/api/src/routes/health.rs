//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::OrderStore;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Open event streams.
    pub live_connections: usize,
}

/// GET /health
pub async fn check<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let status = if state.hub.is_closed() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status,
        live_connections: state.hub.connection_count(),
    })
}
