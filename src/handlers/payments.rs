use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Extension, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for gateway payment confirmation endpoints
pub fn payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/esewa/callback", get(esewa_callback))
        .route("/khalti/verify", post(khalti_verify))
}

#[derive(Debug, Deserialize)]
pub struct EsewaCallbackQuery {
    pub order_id: Uuid,
    pub ref_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct KhaltiVerifyRequest {
    pub order_id: Uuid,
    pub token: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
struct ConfirmationResponse {
    order: crate::entities::OrderModel,
    payment: crate::entities::PaymentModel,
}

/// eSewa success callback: verify the reference with eSewa, then confirm
async fn esewa_callback(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<EsewaCallbackQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (order, payment) = state
        .services
        .checkout
        .confirm_esewa(auth.user_id, query.order_id, &query.ref_id, query.amount)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ConfirmationResponse { order, payment }))
}

/// Khalti verification: verify the token with Khalti, then confirm
async fn khalti_verify(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<KhaltiVerifyRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (order, payment) = state
        .services
        .checkout
        .confirm_khalti(auth.user_id, payload.order_id, &payload.token, payload.amount)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ConfirmationResponse { order, payment }))
}
