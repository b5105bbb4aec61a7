//! HTTP API server for the order coordination core.
//!
//! Exposes checkout, order lifecycle, driver claims and payment endpoints,
//! a server-sent events stream fed by the notification hub, structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod signature;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, patch, post, put};
use fulfillment::services::{Cache, PaymentProvider};
use fulfillment::{Checkout, ClaimService, DriverService, OrderLifecycle, PaymentCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::Hub;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::signature::WebhookVerifier;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub lifecycle: OrderLifecycle<S>,
    pub checkout: Checkout<S>,
    pub claims: ClaimService<S>,
    pub payments: PaymentCoordinator<S>,
    pub drivers: DriverService<S>,
    pub hub: Arc<Hub>,
    /// Checks payment webhook signatures; `None` disables the webhook.
    pub webhook: Option<WebhookVerifier>,
    /// Keep-alive interval of the event stream.
    pub keep_alive: Duration,
}

impl<S: OrderStore + Clone> AppState<S> {
    /// Wires every service over one store and one hub.
    pub fn new(
        store: S,
        hub: Arc<Hub>,
        cache: Arc<dyn Cache>,
        payment_provider: Option<Arc<dyn PaymentProvider>>,
        keep_alive: Duration,
    ) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(store.clone(), hub.clone()),
            checkout: Checkout::new(store.clone(), hub.clone(), cache),
            claims: ClaimService::new(store.clone(), hub.clone()),
            payments: PaymentCoordinator::new(store.clone(), hub.clone(), payment_provider),
            drivers: DriverService::new(store, hub.clone()),
            hub,
            webhook: None,
            keep_alive,
        }
    }

    pub fn with_webhook_verifier(mut self, webhook: Option<WebhookVerifier>) -> Self {
        self.webhook = webhook;
        self
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin, driver, events, orders, payments};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/events", get(events::subscribe::<S>))
        .route("/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S>))
        .route("/orders/{id}/status", patch(orders::update_status::<S>))
        .route("/payments/intents", post(payments::create_intent::<S>))
        .route("/payments/webhook", post(payments::webhook::<S>))
        .route(
            "/driver/profile",
            get(driver::profile::<S>).put(driver::register::<S>),
        )
        .route("/driver/availability", patch(driver::set_availability::<S>))
        .route("/driver/location", post(driver::update_location::<S>))
        .route("/driver/orders/available", get(driver::available::<S>))
        .route("/driver/orders/active", get(driver::active::<S>))
        .route("/driver/orders/{id}/accept", post(driver::accept::<S>))
        .route("/driver/orders/{id}/complete", post(driver::complete::<S>))
        .route(
            "/admin/features/accept-orders",
            get(admin::accept_orders::<S>).post(admin::set_accept_orders::<S>),
        )
        .route("/admin/variants/{id}", put(admin::stock_variant::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
