//! Integration tests for the order lifecycle after checkout: queries,
//! cancellation gating on shipping state and administrative transitions.

mod common;

use assert_matches::assert_matches;
use axum::http::Method;
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::{
    entities::{OrderStatus, PaymentGateway, ShipmentState},
    errors::ServiceError,
    services::{
        cart::AddToCartRequest,
        orders::{AdminOrderFilter, CheckoutRequest},
    },
};
use uuid::Uuid;

async fn place_order(app: &TestApp, slug: &str) -> storefront_api::services::orders::OrderResponse {
    let product = app.seed_product(slug, dec!(10.00), 10).await;
    let address = app.seed_address(app.user_id).await;

    app.state
        .services
        .cart
        .add_item(
            app.user_id,
            AddToCartRequest {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    app.state
        .services
        .orders
        .checkout(
            app.user_id,
            CheckoutRequest {
                amount: dec!(20.00),
                shipping_address_id: address.id,
                gateway: PaymentGateway::Mock,
                simulate_success: Some(true),
            },
        )
        .await
        .unwrap()
}

// ==================== Cancellation Tests ====================

#[tokio::test]
async fn cancel_pending_order_flips_both_statuses() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    let cancelled = app
        .state
        .services
        .orders
        .cancel_order(app.user_id, order.id)
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.shipping_status, Some(ShipmentState::Cancelled));
}

#[tokio::test]
async fn cancel_shipped_order_is_rejected_and_changes_nothing() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    app.state
        .services
        .shipping
        .update_status(order.id, ShipmentState::Shipped)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .cancel_order(app.user_id, order.id)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidStatus(_));

    let unchanged = app
        .state
        .services
        .orders
        .get_order(app.user_id, order.id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, OrderStatus::Confirmed);
    assert_eq!(unchanged.shipping_status, Some(ShipmentState::Shipped));
}

#[tokio::test]
async fn cancel_another_users_order_is_not_found() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    let err = app
        .state
        .services
        .orders
        .cancel_order(Uuid::new_v4(), order.id)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

// ==================== Shipping Status Tests ====================

#[tokio::test]
async fn update_status_without_record_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .shipping
        .update_status(Uuid::new_v4(), ShipmentState::Processing)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn admin_can_walk_the_shipment_lifecycle() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    for state in [
        ShipmentState::Processing,
        ShipmentState::Shipped,
        ShipmentState::Delivered,
    ] {
        let row = app
            .state
            .services
            .shipping
            .update_status(order.id, state)
            .await
            .unwrap();
        assert_eq!(row.status, state);
    }
}

#[tokio::test]
async fn update_status_over_http_requires_admin() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    let forbidden = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/v1/shipping/status/{}", order.id),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(forbidden.status(), 403);

    let allowed = app
        .request_admin(
            Method::PATCH,
            &format!("/api/v1/shipping/status/{}", order.id),
            Some(json!({ "status": "processing" })),
        )
        .await;
    assert_eq!(allowed.status(), 200);

    let body = response_json(allowed).await;
    assert_eq!(body["status"], "processing");
}

// ==================== Query Tests ====================

#[tokio::test]
async fn orders_are_visible_to_their_owner_only() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    let fetched = app
        .state
        .services
        .orders
        .get_order(app.user_id, order.id)
        .await
        .unwrap();
    assert_eq!(fetched.id, order.id);
    assert_eq!(fetched.items.len(), 1);

    let err = app
        .state
        .services
        .orders
        .get_order(Uuid::new_v4(), order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn admin_listing_filters_by_shipping_state() {
    let app = TestApp::new().await;
    let first = place_order(&app, "widget-a").await;
    let second = place_order(&app, "widget-b").await;

    app.state
        .services
        .shipping
        .update_status(second.id, ShipmentState::Shipped)
        .await
        .unwrap();

    let pending = app
        .state
        .services
        .orders
        .list_all_orders(AdminOrderFilter {
            shipping_status: Some(ShipmentState::Pending),
            user_id: None,
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first.id);

    let all = app
        .state
        .services
        .orders
        .list_all_orders(AdminOrderFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn admin_listing_over_http_rejects_non_admin() {
    let app = TestApp::new().await;
    place_order(&app, "widget").await;

    let forbidden = app
        .request_authenticated(Method::GET, "/api/v1/orders/admin/all", None)
        .await;
    assert_eq!(forbidden.status(), 403);

    let allowed = app
        .request_admin(Method::GET, "/api/v1/orders/admin/all", None)
        .await;
    assert_eq!(allowed.status(), 200);

    let body = response_json(allowed).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn payments_listing_shows_settled_payment() {
    let app = TestApp::new().await;
    let order = place_order(&app, "widget").await;

    let payments = app
        .state
        .services
        .payments
        .list_payments(app.user_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].order_id, order.id);
    assert!(payments[0].is_paid);

    let err = app
        .state
        .services
        .payments
        .get_payment_for_order(app.user_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
