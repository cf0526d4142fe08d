use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::{AdminUser, AuthUser},
    errors::ApiError,
    services::shipping::{CreateAddressRequest, UpdateAddressRequest, UpdateStatusRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for shipping endpoints
pub fn shipping_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/:id",
            get(get_address).patch(update_address).delete(delete_address),
        )
        .route("/status/:order_id", patch(update_status))
}

/// Create a shipping address
async fn create_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let address = state
        .services
        .shipping
        .create_address(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(address))
}

/// List the caller's addresses
async fn list_addresses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let addresses = state
        .services
        .shipping
        .list_addresses(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(addresses))
}

/// Fetch one of the caller's addresses
async fn get_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(address_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let address = state
        .services
        .shipping
        .get_address(user.user_id, address_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}

/// Apply a partial update to one of the caller's addresses
async fn update_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(address_id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let address = state
        .services
        .shipping
        .update_address(user.user_id, address_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(address))
}

/// Delete one of the caller's addresses
async fn delete_address(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(address_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .shipping
        .delete_address(user.user_id, address_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Administrative shipment transition
async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = state
        .services
        .shipping
        .update_status(order_id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(status))
}
