use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::AuthUser, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for payment endpoints
pub fn payments_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_payments))
        .route("/:order_id", get(get_payment_for_order))
}

/// List the caller's payments
async fn list_payments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payments = state
        .services
        .payments
        .list_payments(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(payments))
}

/// Fetch the payment settled for one of the caller's orders
async fn get_payment_for_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payment = state
        .services
        .payments
        .get_payment_for_order(user.user_id, order_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(payment))
}
