use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::{AdminUser, AuthUser},
    errors::ApiError,
    services::orders::{AdminOrderFilter, CheckoutRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/admin/all", get(list_all_orders))
}

/// Convert the caller's cart into a confirmed order
async fn checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .checkout(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// List the caller's orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Fetch one of the caller's orders
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(user.user_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Cancel one of the caller's orders (pending shipping only)
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(user.user_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Administrative listing of confirmed orders
async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<AdminOrderFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_all_orders(filter)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}
