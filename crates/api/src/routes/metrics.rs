//! Prometheus scrape endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::PrometheusHandle;

const EXPOSITION_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn render(State(handle): State<PrometheusHandle>) -> Response {
    // Histograms are only drained into their summaries on upkeep.
    handle.run_upkeep();
    ([(CONTENT_TYPE, EXPOSITION_FORMAT)], handle.render()).into_response()
}
