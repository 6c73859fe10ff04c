//! Integration tests for cart management: adding, merging, clamping and
//! removing lines.

mod common;

use std::str::FromStr;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal string")).expect("parse decimal")
}

#[tokio::test]
async fn add_item_resolves_product_and_totals() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_buyer().await;
    let (vendor_user, _) = app.seed_buyer().await;
    let vendor = app.seed_vendor(vendor_user.id, true).await;
    let product = app
        .seed_product(Some(vendor.id), "Sel Roti", dec!(120.00), true)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 3 })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert_eq!(cart["cart"]["user_id"], buyer.id.to_string());
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["item"]["quantity"], 3);
    assert_eq!(cart["items"][0]["product"]["name"], "Sel Roti");
    assert_eq!(decimal(&cart["items"][0]["line_total"]), dec!(360));
    assert_eq!(decimal(&cart["total"]), dec!(360));
}

#[tokio::test]
async fn quantities_clamp_to_fifteen_per_line() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_product(None, "Doormat", dec!(450.00), true).await;

    // A single oversized add clamps.
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 20 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert_eq!(cart["items"][0]["item"]["quantity"], 15);

    // Repeated adds merge into the same line and clamp again.
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 10 })),
            Some(&token),
        )
        .await;
    let cart = response_json(response).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["item"]["quantity"], 15);
}

#[tokio::test]
async fn unapproved_products_cannot_be_added() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let hidden = app
        .seed_product(None, "Hidden Product", dec!(99.00), false)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": hidden.id })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn update_item_sets_quantity_and_zero_removes() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_product(None, "Gundruk", dec!(80.00), true).await;

    let cart = response_json(
        app.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 2 })),
            Some(&token),
        )
        .await,
    )
    .await;
    let item_id = cart["items"][0]["item"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{item_id}"),
            Some(json!({ "quantity": 5 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert_eq!(cart["items"][0]["item"]["quantity"], 5);
    assert_eq!(decimal(&cart["total"]), dec!(400));

    // Zero quantity drops the line entirely.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/cart/items/{item_id}"),
            Some(json!({ "quantity": 0 })),
            Some(&token),
        )
        .await;
    let cart = response_json(response).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&cart["total"]), dec!(0));
}

#[tokio::test]
async fn remove_item_deletes_the_line() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_product(None, "Pickle Jar", dec!(250.00), true).await;

    let cart = response_json(
        app.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id })),
            Some(&token),
        )
        .await,
    )
    .await;
    let item_id = cart["items"][0]["item"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{item_id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn carts_are_per_user() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.seed_buyer().await;
    let (_, bob_token) = app.seed_buyer().await;
    let product = app.seed_product(None, "Muda Stool", dec!(900.00), true).await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id })),
        Some(&alice_token),
    )
    .await;

    // A different buyer cannot see or touch that line.
    let bob_cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&bob_token)).await).await;
    assert!(bob_cart["items"].as_array().unwrap().is_empty());

    let alice_cart =
        response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&alice_token)).await)
            .await;
    let item_id = alice_cart["items"][0]["item"]["id"].as_str().unwrap();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{item_id}"),
            None,
            Some(&bob_token),
        )
        .await;
    assert_eq!(response.status(), 404);
}
