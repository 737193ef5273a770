//! HTTP API server with observability for the checkout system.
//!
//! Provides REST endpoints for order placement, payment reconciliation and
//! inventory administration, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutService, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::Authenticator;

/// Shared application state accessible from all handlers.
pub struct AppState<S, G> {
    pub checkout: CheckoutService<S, G>,
    pub auth: Authenticator,
}

impl<S, G> AppState<S, G> {
    pub fn new(checkout: CheckoutService<S, G>, auth: Authenticator) -> Self {
        Self { checkout, auth }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S, G>))
        .route("/orders", post(routes::orders::create::<S, G>))
        .route("/orders/{reference}", get(routes::orders::get::<S, G>))
        .route(
            "/orders/{reference}/payment",
            post(routes::orders::resume_payment::<S, G>),
        )
        .route(
            "/orders/{reference}/cancel",
            post(routes::orders::cancel::<S, G>),
        )
        .route("/payments/webhook", post(routes::payments::webhook::<S, G>))
        .route("/payments/callback", get(routes::payments::callback))
        .route("/payments/{reference}", get(routes::payments::verify::<S, G>))
        .route("/products", post(routes::products::create::<S, G>))
        .route("/products/{id}", get(routes::products::get::<S, G>))
        .route(
            "/products/{id}/restock",
            post(routes::products::restock::<S, G>),
        )
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
