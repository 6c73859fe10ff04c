//! Integration tests for gateway payment confirmation: eSewa callbacks,
//! Khalti verification, declined verifications and double-confirm guards.

mod common;

use std::str::FromStr;
use std::sync::Arc;

use axum::{body, http::Method, response::Response};
use common::{FakeGateway, TestApp};
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

/// Seed a buyer with a pending gateway order worth 500.00 and return the
/// buyer token and order id.
async fn pending_order(app: &TestApp, method: &str) -> (String, String) {
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_sellable_product("Singing Bowl", dec!(500.00)).await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id })),
        Some(&token),
    )
    .await;

    let outcome = response_json(
        app.request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "payment_method": method })),
            Some(&token),
        )
        .await,
    )
    .await;
    let order_id = outcome["order"]["id"].as_str().unwrap().to_string();
    (token, order_id)
}

#[tokio::test]
async fn khalti_verification_confirms_the_order() {
    let app = TestApp::new().await;
    let (token, order_id) = pending_order(&app, "khalti").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "khalti-token-123",
                "amount": "500.00"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 200);
    let confirmation = response_json(response).await;
    assert_eq!(confirmation["order"]["status"], "paid");
    assert_eq!(confirmation["payment"]["status"], "success");
    assert_eq!(confirmation["payment"]["transaction_id"], "khalti-token-123");
    assert_eq!(decimal(&confirmation["payment"]["amount"]), dec!(500));

    // Confirmation drains the cart into order items.
    let cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn esewa_callback_confirms_the_order() {
    let app = TestApp::new().await;
    let (token, order_id) = pending_order(&app, "esewa").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/payments/esewa/callback?order_id={order_id}&ref_id=ESEWA-REF-9&amount=500.00"),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 200);
    let confirmation = response_json(response).await;
    assert_eq!(confirmation["order"]["status"], "paid");
    assert_eq!(confirmation["payment"]["transaction_id"], "ESEWA-REF-9");
}

#[tokio::test]
async fn declined_verification_returns_payment_required() {
    let app = TestApp::with_gateways(
        Arc::new(FakeGateway::declining()),
        Arc::new(FakeGateway::declining()),
    )
    .await;
    let (token, order_id) = pending_order(&app, "khalti").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "bad-token",
                "amount": "500.00"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 402);

    // The order stays pending and can still be paid later.
    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(order["order"]["status"], "pending");
    assert!(order["payment"].is_null());
}

#[tokio::test]
async fn amount_mismatch_is_rejected() {
    let app = TestApp::new().await;
    let (token, order_id) = pending_order(&app, "khalti").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "khalti-token-123",
                "amount": "450.00"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn gateway_settled_amount_overrides_client_claim() {
    // The gateway reports the true settled amount; a client lying about the
    // total cannot make a short payment stick.
    let app = TestApp::with_gateways(
        Arc::new(FakeGateway::approving()),
        Arc::new(FakeGateway::approving_with_amount(dec!(450.00))),
    )
    .await;
    let (token, order_id) = pending_order(&app, "khalti").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "khalti-token-123",
                "amount": "500.00"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn second_confirmation_conflicts_without_duplicating_state() {
    let app = TestApp::new().await;
    let (token, order_id) = pending_order(&app, "khalti").await;

    let payload = json!({
        "order_id": order_id,
        "token": "khalti-token-123",
        "amount": "500.00"
    });

    let first = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(payload.clone()),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), 200);

    let second = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(payload),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), 409);

    // Exactly one payment row and one set of order items exist.
    use openbazar_api::entities::{order_item, payment, OrderItem, Payment};
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
    use uuid::Uuid;

    let order_uuid = Uuid::from_str(&order_id).unwrap();
    let payments = Payment::find()
        .filter(payment::Column::OrderId.eq(order_uuid))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(payments, 1);

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_uuid))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(items, 1);
}

#[tokio::test]
async fn confirming_with_the_wrong_method_is_rejected() {
    let app = TestApp::new().await;
    let (token, order_id) = pending_order(&app, "esewa").await;

    // An eSewa order cannot be confirmed through the Khalti endpoint.
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "khalti-token-123",
                "amount": "500.00"
            })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn buyers_cannot_confirm_other_buyers_orders() {
    let app = TestApp::new().await;
    let (_, order_id) = pending_order(&app, "khalti").await;
    let (_, stranger_token) = app.seed_buyer().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/khalti/verify",
            Some(json!({
                "order_id": order_id,
                "token": "khalti-token-123",
                "amount": "500.00"
            })),
            Some(&stranger_token),
        )
        .await;

    assert_eq!(response.status(), 404);
}
