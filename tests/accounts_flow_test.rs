//! Integration tests for registration, login and profile management.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn register_issues_token_and_login_works() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "asha@example.com",
                "password": "sup3r-secret",
                "password2": "sup3r-secret",
                "first_name": "Asha",
                "last_name": "Shrestha",
                "phone": "9811111111",
                "address": "Lalitpur"
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().expect("access token");

    // The token from registration authenticates immediately.
    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(token))
        .await;
    assert_eq!(me.status(), 200);
    let me_body = response_json(me).await;
    assert_eq!(me_body["email"], "asha@example.com");
    assert_eq!(me_body["profile"]["phone"], "9811111111");
    assert_eq!(me_body["profile"]["is_vendor"], false);

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({
                "email": "asha@example.com",
                "password": "sup3r-secret"
            })),
            None,
        )
        .await;
    assert_eq!(login.status(), 200);
    let login_body = response_json(login).await;
    assert!(login_body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn register_without_contact_details_leaves_them_unset() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "minimal@example.com",
                "password": "sup3r-secret",
                "password2": "sup3r-secret",
                "first_name": "Min",
                "last_name": "Imal"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    let token = response_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let me = response_json(app.request(Method::GET, "/api/v1/auth/me", None, Some(&token)).await)
        .await;
    assert!(me["profile"]["phone"].is_null());
    assert!(me["profile"]["address"].is_null());

    // Filling them in later works and leaves the other field untouched.
    let updated = response_json(
        app.request(
            Method::PUT,
            "/api/v1/auth/profile",
            Some(json!({ "phone": "9822222222" })),
            Some(&token),
        )
        .await,
    )
    .await;
    assert_eq!(updated["profile"]["phone"], "9822222222");
    assert!(updated["profile"]["address"].is_null());
}

#[tokio::test]
async fn register_rejects_password_mismatch() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "mismatch@example.com",
                "password": "sup3r-secret",
                "password2": "different-secret",
                "first_name": "A",
                "last_name": "B"
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn register_rejects_duplicate_email_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_user("taken@example.com", false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "Taken@Example.com",
                "password": "sup3r-secret",
                "password2": "sup3r-secret",
                "first_name": "A",
                "last_name": "B"
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = TestApp::new().await;
    app.seed_user("wrongpw@example.com", false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({
                "email": "wrongpw@example.com",
                "password": "not-the-password"
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbage_tokens() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(missing.status(), 401);

    let garbage = app
        .request(Method::GET, "/api/v1/auth/me", None, Some("not.a.jwt"))
        .await;
    assert_eq!(garbage.status(), 401);
}

#[tokio::test]
async fn profile_update_is_partial() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/auth/profile",
            Some(json!({
                "first_name": "Renamed",
                "address": "Pokhara"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["first_name"], "Renamed");
    // Untouched fields keep their seeded values.
    assert_eq!(body["last_name"], "User");
    assert_eq!(body["profile"]["address"], "Pokhara");
    assert_eq!(body["profile"]["phone"], "9800000000");
}
