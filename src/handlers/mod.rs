use crate::{
    events::EventSender,
    services::{
        cart::CartService, catalog::CatalogService, orders::OrderService,
        payments::PaymentService, shipping::ShippingService,
    },
    AppState,
};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod carts;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;

// Re-export route builders
pub use carts::carts_routes;
pub use orders::orders_routes;
pub use payments::payments_routes;
pub use products::{categories_routes, products_routes};
pub use shipping::shipping_routes;

/// Aggregated services handed to HTTP handlers through AppState.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub shipping: Arc<ShippingService>,
    pub catalog: Arc<CatalogService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        let payments = Arc::new(PaymentService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            payments.clone(),
        ));

        Self {
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            orders,
            payments,
            shipping: Arc::new(ShippingService::new(db.clone(), event_sender.clone())),
            catalog: Arc::new(CatalogService::new(db, event_sender)),
        }
    }
}

/// Builds the versioned API router.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/cart", carts_routes())
        .nest("/orders", orders_routes())
        .nest("/payments", payments_routes())
        .nest("/shipping", shipping_routes())
        .nest("/products", products_routes())
        .nest("/categories", categories_routes())
}
