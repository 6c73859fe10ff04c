//! OpenBazar API Library
//!
//! Multi-vendor marketplace backend: buyer accounts, product catalog,
//! carts, checkout with COD and regional gateway payments, vendor
//! onboarding, and staff moderation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateways;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the full `/api/v1` route tree.
///
/// Everything except registration, login, the catalog and the health check
/// requires a bearer token; `/admin` additionally requires the "staff" role.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    let auth_routes = handlers::accounts::public_routes()
        .merge(handlers::accounts::protected_routes().with_auth());

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/products", handlers::products::products_routes())
        .nest("/cart", handlers::carts::carts_routes().with_auth())
        .nest("/checkout", handlers::checkout::checkout_routes().with_auth())
        .nest("/orders", handlers::checkout::orders_routes().with_auth())
        .nest("/payments", handlers::payments::payments_routes().with_auth())
        .nest("/vendors", handlers::vendors::vendors_routes().with_auth())
        .nest(
            "/admin",
            handlers::admin::admin_routes().with_role(auth::ROLE_STAFF),
        )
}
