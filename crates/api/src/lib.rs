//! HTTP API server for the bakery order system.
//!
//! Provides REST endpoints for products and orders, with structured logging
//! (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::{Money, NewCustomer, NewProduct, Role, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CatalogGateway, CustomerDirectory, InMemoryStore, StoreError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, Backend};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: Backend>(state: Arc<AppState<B>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list::<B>).post(routes::products::create::<B>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<B>)
                .patch(routes::products::update::<B>)
                .delete(routes::products::delete::<B>),
        )
        .route(
            "/orders",
            get(routes::orders::list::<B>).post(routes::orders::create::<B>),
        )
        .route("/orders/{id}", get(routes::orders::get::<B>))
        .route(
            "/orders/{id}/status",
            axum::routing::patch(routes::orders::update_status::<B>),
        )
        .route("/orders/{id}/history", get(routes::orders::history::<B>))
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

/// Creates the application state over a backend.
pub fn create_state<B: Backend>(backend: B) -> Arc<AppState<B>> {
    Arc::new(AppState::new(backend))
}

/// Email of the administrator registered by [`seed_demo_data`].
pub const DEMO_ADMIN_EMAIL: &str = "admin@bakery.local";

/// Fills an empty in-memory store with an administrator and a small
/// catalog, returning the administrator's id.
pub async fn seed_demo_data(store: &InMemoryStore) -> Result<UserId, StoreError> {
    let admin = store
        .create(NewCustomer {
            role: Role::Admin,
            name: "Bakery admin".to_string(),
            email: DEMO_ADMIN_EMAIL.to_string(),
            phone: String::new(),
            password_hash: None,
        })
        .await?;

    for (name, description, cents, stock) in [
        ("Baguette", "Classic French loaf", 250, 40),
        ("Croissant", "All-butter croissant", 180, 60),
        ("Sourdough", "Country sourdough, 1kg", 650, 15),
        ("Lemon tart", "Individual lemon tart", 420, 12),
    ] {
        store
            .create_product(NewProduct {
                name: name.to_string(),
                description: Some(description.to_string()),
                price: Money::from_cents(cents),
                stock,
            })
            .await?;
    }

    Ok(admin)
}
