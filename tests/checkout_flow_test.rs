//! Integration tests for the checkout protocol: validation ordering,
//! atomicity of the transaction and exact stock arithmetic.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    entities::{OrderStatus, PaymentGateway, ShipmentState},
    errors::ServiceError,
    services::{cart::AddToCartRequest, catalog::UpdateProductRequest, orders::CheckoutRequest},
};
use uuid::Uuid;

fn checkout_request(
    amount: rust_decimal::Decimal,
    address_id: Uuid,
    simulate_success: bool,
) -> CheckoutRequest {
    CheckoutRequest {
        amount,
        shipping_address_id: address_id,
        gateway: PaymentGateway::Mock,
        simulate_success: Some(simulate_success),
    }
}

async fn fill_cart(app: &TestApp, product_id: Uuid, quantity: i32) {
    app.state
        .services
        .cart
        .add_item(
            app.user_id,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await
        .expect("fill cart");
}

// ==================== Successful Checkout ====================

#[tokio::test]
async fn checkout_confirms_order_decrements_stock_and_clears_cart() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 2).await;

    let order = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(20.00), address.id, true))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.total_price, dec!(20.00));
    assert_eq!(order.shipping_status, Some(ShipmentState::Pending));
    assert_eq!(order.shipping_address.id, address.id);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price, dec!(10.00));

    // Stock reserved exactly once
    let detail = app
        .state
        .services
        .catalog
        .get_product(product.id)
        .await
        .unwrap();
    assert_eq!(detail.product.stock_quantity, 3);

    // Cart fully cleared
    let summary = app
        .state
        .services
        .cart
        .list_cart(app.user_id)
        .await
        .unwrap();
    assert!(summary.items.is_empty());

    // Payment settled and queryable
    let payment = app
        .state
        .services
        .payments
        .get_payment_for_order(app.user_id, order.id)
        .await
        .unwrap();
    assert!(payment.is_paid);
    assert!(payment.pg_order_id.as_deref().unwrap().starts_with("MOCK-OD-"));
    assert!(payment.pg_payment_id.as_deref().unwrap().starts_with("MOCK-PY-"));
    assert!(payment.pg_signature.as_deref().unwrap().starts_with("MOCK-SI-"));
}

#[tokio::test]
async fn checkout_accepts_amount_within_one_cent() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 2).await;

    let order = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(20.01), address.id, true))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn repeated_checkouts_keep_stock_arithmetic_exact() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 10).await;
    let address = app.seed_address(app.user_id).await;

    for _ in 0..3 {
        fill_cart(&app, product.id, 3).await;
        app.state
            .services
            .orders
            .checkout(app.user_id, checkout_request(dec!(30.00), address.id, true))
            .await
            .unwrap();
    }

    let detail = app
        .state
        .services
        .catalog
        .get_product(product.id)
        .await
        .unwrap();
    assert_eq!(detail.product.stock_quantity, 1);
}

#[tokio::test]
async fn checkout_skips_lines_whose_product_was_deleted() {
    let app = TestApp::new().await;
    let keeper = app.seed_product("keeper", dec!(4.00), 10).await;
    let doomed = app.seed_product("doomed", dec!(6.00), 10).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, keeper.id, 2).await;
    fill_cart(&app, doomed.id, 1).await;

    app.state
        .services
        .catalog
        .delete_product(doomed.id)
        .await
        .unwrap();

    // Only the surviving line is charged
    let order = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(8.00), address.id, true))
        .await
        .unwrap();

    assert_eq!(order.items.len(), 1);
    assert_eq!(order.total_price, dec!(8.00));
}

// ==================== Validation Failures ====================

#[tokio::test]
async fn checkout_with_empty_cart_fails() {
    let app = TestApp::new().await;
    let address = app.seed_address(app.user_id).await;

    let err = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(10.00), address.id, true))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::EmptyCart);
}

#[tokio::test]
async fn checkout_fails_when_stock_ran_out() {
    let app = TestApp::new().await;
    let product = app.seed_product("scarce", dec!(10.00), 3).await;
    let address = app.seed_address(app.user_id).await;

    // A competing buyer drains the stock after this cart was filled
    fill_cart(&app, product.id, 2).await;
    let rival = Uuid::new_v4();
    app.state
        .services
        .cart
        .add_item(
            rival,
            AddToCartRequest {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await
        .unwrap();
    let rival_address = app.seed_address(rival).await;
    app.state
        .services
        .orders
        .checkout(rival, checkout_request(dec!(20.00), rival_address.id, true))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(20.00), address.id, true))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Nothing was persisted for the failed attempt
    let summary = app
        .state
        .services
        .cart
        .list_cart(app.user_id)
        .await
        .unwrap();
    assert_eq!(summary.total_quantity, 2);
    assert!(app
        .state
        .services
        .orders
        .list_orders(app.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn checkout_fails_when_price_snapshot_is_stale() {
    let app = TestApp::new().await;
    let product = app.seed_product("volatile", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 1).await;

    app.state
        .services
        .catalog
        .update_product(
            product.id,
            UpdateProductRequest {
                price: Some(dec!(12.00)),
                title: None,
                description: None,
                slug: None,
                stock_quantity: None,
                image_url: None,
                category_ids: None,
            },
        )
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(10.00), address.id, true))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PriceMismatch(_));
}

#[tokio::test]
async fn checkout_fails_on_amount_mismatch() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 2).await;

    let err = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(25.00), address.id, true))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::AmountMismatch);
}

#[tokio::test]
async fn checkout_fails_on_foreign_address() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let foreign_address = app.seed_address(Uuid::new_v4()).await;
    fill_cart(&app, product.id, 2).await;

    let err = app
        .state
        .services
        .orders
        .checkout(
            app.user_id,
            checkout_request(dec!(20.00), foreign_address.id, true),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidAddress);
}

#[tokio::test]
async fn checkout_fails_on_missing_address() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    fill_cart(&app, product.id, 2).await;

    let err = app
        .state
        .services
        .orders
        .checkout(
            app.user_id,
            checkout_request(dec!(20.00), Uuid::new_v4(), true),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidAddress);
}

// ==================== Payment Failures ====================

#[tokio::test]
async fn failed_payment_rolls_back_everything() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 2).await;

    let err = app
        .state
        .services
        .orders
        .checkout(app.user_id, checkout_request(dec!(20.00), address.id, false))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PaymentFailed(_));

    // Stock untouched
    let detail = app
        .state
        .services
        .catalog
        .get_product(product.id)
        .await
        .unwrap();
    assert_eq!(detail.product.stock_quantity, 5);

    // No order, no payment
    assert!(app
        .state
        .services
        .orders
        .list_orders(app.user_id)
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .services
        .payments
        .list_payments(app.user_id)
        .await
        .unwrap()
        .is_empty());

    // Cart contents intact
    let summary = app
        .state
        .services
        .cart
        .list_cart(app.user_id)
        .await
        .unwrap();
    assert_eq!(summary.total_quantity, 2);
}

#[tokio::test]
async fn unsupported_gateway_aborts_before_any_mutation() {
    let app = TestApp::new().await;
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let address = app.seed_address(app.user_id).await;
    fill_cart(&app, product.id, 2).await;

    let err = app
        .state
        .services
        .orders
        .checkout(
            app.user_id,
            CheckoutRequest {
                amount: dec!(20.00),
                shipping_address_id: address.id,
                gateway: PaymentGateway::Razorpay,
                simulate_success: Some(true),
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::UnsupportedGateway(_));

    assert!(app
        .state
        .services
        .orders
        .list_orders(app.user_id)
        .await
        .unwrap()
        .is_empty());

    let detail = app
        .state
        .services
        .catalog
        .get_product(product.id)
        .await
        .unwrap();
    assert_eq!(detail.product.stock_quantity, 5);
}
