use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::accounts::{RegisterInput, UpdateProfileInput},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Creates the router for public auth endpoints (register, login)
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Creates the router for authenticated account endpoints
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_profile))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub password2: String,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Register a new buyer account
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = RegisterInput {
        email: payload.email,
        password: payload.password,
        password2: payload.password2,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        address: payload.address,
    };

    let token = state
        .services
        .accounts
        .register(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(token))
}

/// Log in with email and password
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let token = state
        .services
        .accounts
        .login(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(token))
}

/// Current account with profile
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state
        .services
        .accounts
        .get_profile(auth.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}

/// Update name and contact details
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let input = UpdateProfileInput {
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        address: payload.address,
    };

    let view = state
        .services
        .accounts
        .update_profile(auth.user_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(view))
}
