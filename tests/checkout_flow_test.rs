//! Integration tests for checkout: order creation, cash-on-delivery
//! confirmation, price snapshots and buyer order history.

mod common;

use std::str::FromStr;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use uuid::Uuid;

use openbazar_api::entities::{order_item, OrderItem};

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
async fn cod_checkout_confirms_inline_and_empties_cart() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let (vendor_user, _) = app.seed_buyer().await;
    let vendor = app.seed_vendor(vendor_user.id, true).await;
    let product = app
        .seed_product(Some(vendor.id), "Juju Dhau", dec!(10.00), true)
        .await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 2 })),
        Some(&token),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "payment_method": "cod" })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 201);
    let outcome = response_json(response).await;
    assert_eq!(outcome["order"]["status"], "paid");
    assert_eq!(outcome["order"]["payment_method"], "cod");
    assert_eq!(decimal(&outcome["order"]["total_amount"]), dec!(20));
    // COD payments stay pending until delivery.
    assert_eq!(outcome["payment"]["status"], "pending");
    assert!(outcome["payment"]["transaction_id"].is_null());
    assert_eq!(decimal(&outcome["payment"]["amount"]), dec!(20));

    // Order items are materialized with the vendor and price snapshot.
    let order_id = Uuid::from_str(outcome["order"]["id"].as_str().unwrap()).unwrap();
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&*app.state.db)
        .await
        .expect("load order items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].vendor_id, vendor.id);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price, dec!(10.00));
    assert!(!items[0].is_completed);

    // The cart is emptied by the confirmation.
    let cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "payment_method": "cod" })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 422);

    // No order row was created.
    let orders = response_json(app.request(Method::GET, "/api/v1/orders", None, Some(&token)).await)
        .await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn gateway_checkout_leaves_order_pending() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_sellable_product("Pashmina Shawl", dec!(2500.00)).await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id })),
        Some(&token),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "payment_method": "khalti" })),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), 201);
    let outcome = response_json(response).await;
    assert_eq!(outcome["order"]["status"], "pending");
    assert!(outcome["payment"].is_null());

    // The cart survives until the payment is confirmed.
    let cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn order_total_is_frozen_against_later_price_changes() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_buyer().await;
    let product = app.seed_sellable_product("Thangka Print", dec!(1500.00)).await;

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
            Some(json!({ "payment_method": "cod" })),
            Some(&token),
        )
        .await,
    )
    .await;
    let order_id = outcome["order"]["id"].as_str().unwrap().to_string();

    // Raise the price after the sale.
    use sea_orm::{ActiveModelTrait, Set};
    let mut active: openbazar_api::entities::product::ActiveModel =
        openbazar_api::entities::Product::find_by_id(product.id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap()
            .into();
    active.price = Set(dec!(9999.00));
    active.update(&*app.state.db).await.unwrap();

    let order = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(decimal(&order["order"]["total_amount"]), dec!(1500));
}

#[tokio::test]
async fn buyers_only_see_their_own_orders() {
    let app = TestApp::new().await;
    let (_, alice_token) = app.seed_buyer().await;
    let (_, bob_token) = app.seed_buyer().await;
    let product = app.seed_sellable_product("Khukuri Letter Opener", dec!(700.00)).await;

    app.request(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id })),
        Some(&alice_token),
    )
    .await;
    let outcome = response_json(
        app.request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "payment_method": "cod" })),
            Some(&alice_token),
        )
        .await,
    )
    .await;
    let order_id = outcome["order"]["id"].as_str().unwrap().to_string();

    let bob_view = app
        .request(Method::GET, &format!("/api/v1/orders/{order_id}"), None, Some(&bob_token))
        .await;
    assert_eq!(bob_view.status(), 404);

    let bob_orders =
        response_json(app.request(Method::GET, "/api/v1/orders", None, Some(&bob_token)).await)
            .await;
    assert!(bob_orders.as_array().unwrap().is_empty());

    let alice_orders =
        response_json(app.request(Method::GET, "/api/v1/orders", None, Some(&alice_token)).await)
            .await;
    assert_eq!(alice_orders.as_array().unwrap().len(), 1);
}
