use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AdminUser,
    errors::ApiError,
    services::catalog::{CreateCategoryRequest, CreateProductRequest, UpdateProductRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

/// Creates the router for category endpoints
pub fn categories_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_categories).post(create_category))
}

/// List products with pagination
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .list_products(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products,
        params.page,
        params.per_page,
        total,
    )))
}

/// Fetch a product with its categories
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .catalog
        .get_product(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Create a product (admin)
async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// Apply a partial update to a product (admin)
async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(product_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Delete a product (admin)
async fn delete_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// List categories
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

/// Create a category (admin)
async fn create_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let category = state
        .services
        .catalog
        .create_category(payload.name)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(category))
}
