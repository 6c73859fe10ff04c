use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{auth::AuthUser, entities::PaymentMethod, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for checkout and buyer order endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(checkout))
}

/// Creates the router for the buyer's order history
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
struct OrderWithPayment {
    order: crate::entities::OrderModel,
    payment: Option<crate::entities::PaymentModel>,
}

/// Check out the cart. COD confirms inline; gateway methods return the
/// pending order for the client-side redirect.
async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .checkout(auth.user_id, payload.payment_method)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(outcome))
}

/// List the caller's orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .checkout
        .list_orders(auth.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Fetch one of the caller's orders with its payment
async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (order, payment) = state
        .services
        .checkout
        .get_order(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(OrderWithPayment { order, payment }))
}
