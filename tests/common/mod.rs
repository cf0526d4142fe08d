use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    app,
    config::AppConfig,
    db,
    entities::{ProductModel, ShippingAddressModel},
    events::{self, EventSender},
    services::{catalog::CreateProductRequest, shipping::CreateAddressRequest},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test harness backed by an in-memory SQLite database. Each instance gets
/// its own database; the pool is capped at one connection so the in-memory
/// database survives for the harness lifetime.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub user_id: Uuid,
    token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = Arc::new(AppState::new(Arc::new(pool), cfg, event_sender));
        let router = app(state.clone());

        let user_id = Uuid::new_v4();
        let token = state
            .auth
            .generate_token(user_id, false)
            .expect("user token");
        let admin_token = state
            .auth
            .generate_token(Uuid::new_v4(), true)
            .expect("admin token");

        Self {
            router,
            state,
            user_id,
            token,
            admin_token,
            _event_task: event_task,
        }
    }

    /// Insert a product through the catalog service.
    pub async fn seed_product(&self, slug: &str, price: Decimal, stock: i32) -> ProductModel {
        self.state
            .services
            .catalog
            .create_product(CreateProductRequest {
                title: format!("Product {}", slug),
                description: None,
                slug: slug.to_string(),
                price,
                stock_quantity: stock,
                image_url: None,
                category_ids: Vec::new(),
            })
            .await
            .expect("seed product")
    }

    /// Insert a shipping address owned by the given user.
    pub async fn seed_address(&self, user_id: Uuid) -> ShippingAddressModel {
        self.state
            .services
            .shipping
            .create_address(
                user_id,
                CreateAddressRequest {
                    name: "Test Recipient".to_string(),
                    address_line1: "1 Test Street".to_string(),
                    address_line2: None,
                    city: "Testville".to_string(),
                    state: "TS".to_string(),
                    pin_code: "00001".to_string(),
                    country: "IN".to_string(),
                },
            )
            .await
            .expect("seed address")
    }

    /// Issue a request with the default (non-admin) user's token.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, Some(self.token.as_str()), body)
            .await
    }

    /// Issue a request with the admin token.
    pub async fn request_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, Some(self.admin_token.as_str()), body)
            .await
    }

    /// Issue a raw request, optionally authenticated.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }
}

/// Read a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
