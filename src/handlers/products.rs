//! Product HTTP handlers.
//!
//! - POST|GET /api/v1/businesses/{id}/products - Create / list (owner)
//! - GET|PATCH|DELETE /api/v1/products/{id} - Manage one product
//! - PUT /api/v1/products/{id}/active - Show or hide
//! - GET /api/v1/public/products/{id} - Public product page

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::product::{
        CreateProductRequest, Product, ProductResponse, SetActiveRequest, UpdateProductRequest,
    },
    services::product_service,
};

/// Create a product.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Sourdough loaf",
///   "price_cents": 350000,
///   "stock": 20
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the product
/// - **422**: plan product quota reached (`quota_exceeded`)
/// - **403**: `is_featured` on the FREE plan
pub async fn create_product(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let product = product_service::create_product(&pool, &auth, business_id, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// All products of a business, inactive ones included.
pub async fn list_products(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    Ok(Json(
        product_service::list_business_products(&pool, &auth, business_id).await?,
    ))
}

pub async fn get_product(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, AppError> {
    Ok(Json(
        product_service::get_owned_product(&pool, &auth, product_id).await?,
    ))
}

pub async fn update_product(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        product_service::update_product(&pool, &auth, product_id, request).await?,
    ))
}

pub async fn set_product_active(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        product_service::set_product_active(&pool, &auth, product_id, request.is_active).await?,
    ))
}

pub async fn delete_product(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    product_service::delete_product(&pool, &auth, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_public_product(
    State(pool): State<DbPool>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, AppError> {
    Ok(Json(
        product_service::get_public_product(&pool, product_id).await?,
    ))
}
