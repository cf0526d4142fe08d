use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::cart::{AddToCartRequest, AdjustQuantityRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_cart))
        .route("/items", post(add_to_cart))
        // PATCH adjusts the line for a product id; DELETE removes a line by
        // its cart-item id.
        .route("/items/:id", patch(adjust_quantity).delete(remove_cart_item))
}

/// Add a product to the caller's cart
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .cart
        .add_item(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// List the caller's cart with totals
async fn list_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let summary = state
        .services
        .cart
        .list_cart(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}

/// Adjust the quantity of the cart line for a product
async fn adjust_quantity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let adjustment = state
        .services
        .cart
        .adjust_quantity(user.user_id, product_id, payload.delta)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(adjustment))
}

/// Remove a cart line by its id
async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove_item(user.user_id, item_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
