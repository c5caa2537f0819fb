//! HTTP API server for the marketplace ordering core.
//!
//! A thin axum layer over the stores, the checkout engine, and the status
//! workflow, with structured logging (tracing) and Prometheus metrics.
//! Authentication and authorization live outside this crate; the `/admin`
//! routes only mark the privileged surface for the external auth layer.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CheckoutEngine, OrderWorkflow};
use market_store::MarketStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub engine: CheckoutEngine<S>,
    pub workflow: OrderWorkflow<S>,
    pub store: S,
}

impl<S: MarketStore + Clone> AppState<S> {
    /// Builds the state over one store shared by engine, workflow, and the
    /// plain query paths.
    pub fn new(store: S) -> Self {
        Self {
            engine: CheckoutEngine::new(store.clone()),
            workflow: OrderWorkflow::new(store.clone()),
            store,
        }
    }
}

/// Creates the axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/products/{id}/stock", put(routes::products::set_stock::<S>))
        .route(
            "/products/{id}/status",
            put(routes::products::set_status::<S>),
        )
        .route("/admin/products/{id}", get(routes::products::get_full::<S>))
        .route("/carts/{owner}", get(routes::carts::get::<S>))
        .route(
            "/carts/{owner}/items",
            post(routes::carts::add_item::<S>).delete(routes::carts::clear::<S>),
        )
        .route(
            "/carts/{owner}/items/{product_id}",
            put(routes::carts::set_quantity::<S>).delete(routes::carts::remove_item::<S>),
        )
        .route("/carts/{owner}/merge", post(routes::carts::merge::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", post(routes::orders::transition::<S>))
        .route("/admin/orders", get(routes::orders::list_all::<S>))
        .route(
            "/admin/orders/{id}/status",
            put(routes::orders::force_status::<S>),
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
