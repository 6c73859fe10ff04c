use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    entities::ProductCategory,
    errors::ApiError,
    services::vendors::{CreateProductInput, RegisterVendorInput, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Extension, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for vendor endpoints
pub fn vendors_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_vendor))
        .route("/dashboard", get(dashboard))
        .route("/products", get(list_products))
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(delete_product))
        .route("/orders", get(list_order_items))
        .route("/orders/items/:item_id/complete", post(complete_order_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterVendorRequest {
    #[validate(length(min = 1))]
    pub bank_details: String,
    #[validate(length(min = 1))]
    pub nid_number: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<ProductCategory>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Apply to become a vendor (starts unapproved)
async fn register_vendor(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<RegisterVendorRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = RegisterVendorInput {
        bank_details: payload.bank_details,
        nid_number: payload.nid_number,
    };

    let vendor = state
        .services
        .vendors
        .register_vendor(auth.user_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(vendor))
}

/// Vendor dashboard: own record plus products
async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let dashboard = state
        .services
        .vendors
        .dashboard(auth.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(dashboard))
}

/// List the vendor's own products
async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .vendors
        .list_own_products(auth.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

/// Create a product (approved vendors only)
async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = CreateProductInput {
        name: payload.name,
        category: payload.category,
        price: payload.price,
        description: payload.description,
        image_url: payload.image_url,
    };

    let product = state
        .services
        .vendors
        .create_product(auth.user_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// Update one of the vendor's own products
async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = UpdateProductInput {
        name: payload.name,
        category: payload.category,
        price: payload.price,
        description: payload.description,
        image_url: payload.image_url,
    };

    let product = state
        .services
        .vendors
        .update_product(auth.user_id, id, input)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Delete one of the vendor's own products
async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .vendors
        .delete_product(auth.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// List the vendor's order items, newest order first
async fn list_order_items(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let items = state
        .services
        .orders
        .list_vendor_order_items(auth.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Mark one of the vendor's order items complete
async fn complete_order_item(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let item = state
        .services
        .orders
        .complete_order_item(auth.user_id, item_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}
