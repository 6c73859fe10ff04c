use crate::handlers::common::{
    map_service_error, no_content_response, success_response, PaginationParams,
};
use crate::{auth::AuthUser, entities::OrderStatus, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for staff back-office endpoints. Gated behind the
/// "staff" role at mount time.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/orders", get(list_orders))
        .route("/users", get(list_users))
        .route("/payments", get(list_payments))
        .route("/vendors/:id/approve", post(approve_vendor))
        .route("/vendors/:id/reject", post(reject_vendor))
        .route("/products/:id/approve", post(approve_product))
        .route("/products/:id/disable", post(disable_product))
        .route("/orders/:id/status", put(set_order_status))
        .route("/orders/:id", delete(delete_order))
        .route("/users/:id/toggle-active", post(toggle_user_active))
}

#[derive(Debug, Deserialize)]
pub struct SetOrderStatusRequest {
    pub status: OrderStatus,
}

/// Aggregate dashboard figures
async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let stats = state
        .services
        .admin
        .dashboard_stats()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(stats))
}

/// List all orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .admin
        .list_orders(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// List all user accounts
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .admin
        .list_users(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// List all payments
async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .admin
        .list_payments(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// Approve a vendor application
async fn approve_vendor(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let vendor = state
        .services
        .admin
        .approve_vendor(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(vendor))
}

/// Reject a vendor application (resets to pending)
async fn reject_vendor(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let vendor = state
        .services
        .admin
        .reject_vendor(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(vendor))
}

/// Make a product visible in the storefront
async fn approve_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .admin
        .approve_product(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Hide a product from the storefront
async fn disable_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .admin
        .disable_product(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Staff override of an order's status (forward-only)
async fn set_order_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .admin
        .set_order_status(auth.user_id, id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Delete an order (items and payment cascade)
async fn delete_order(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .admin
        .delete_order(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Activate or deactivate a user account
async fn toggle_user_active(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let account = state
        .services
        .admin
        .toggle_user_active(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(account))
}
