//! Business (storefront) HTTP handlers.
//!
//! - POST /api/v1/businesses - Create business
//! - GET /api/v1/businesses - List caller's businesses
//! - GET|PATCH|DELETE /api/v1/businesses/{id}
//! - PUT /api/v1/businesses/{id}/settings - Publish, hours, social links
//! - GET /api/v1/storefronts/{slug} - Public storefront

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
    models::business::{
        Business, BusinessResponse, BusinessSettingsRequest, CreateBusinessRequest,
        StorefrontResponse, UpdateBusinessRequest,
    },
    services::business_service,
};

/// Create a business.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "La Esquina Bakery",
///   "description": "Fresh bread every morning",
///   "city": "Córdoba"
/// }
/// ```
///
/// # Response (201 Created)
///
/// The business with its slug (`la-esquina-bakery`) and the FREE plan it
/// starts on. Businesses start unpublished.
pub async fn create_business(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBusinessRequest>,
) -> Result<impl IntoResponse, AppError> {
    let business = business_service::create_business(&pool, auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn list_businesses(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Business>>, AppError> {
    Ok(Json(
        business_service::list_my_businesses(&pool, auth.user_id).await?,
    ))
}

/// Get one of the caller's businesses with its current plan.
///
/// Returns 404 for businesses owned by someone else.
pub async fn get_business(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<BusinessResponse>, AppError> {
    Ok(Json(
        business_service::get_my_business(&pool, &auth, business_id).await?,
    ))
}

pub async fn update_business(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<UpdateBusinessRequest>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(
        business_service::update_business(&pool, &auth, business_id, request).await?,
    ))
}

pub async fn update_settings(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<BusinessSettingsRequest>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(
        business_service::update_settings(&pool, &auth, business_id, request).await?,
    ))
}

/// Soft delete. Returns 204 No Content.
pub async fn delete_business(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    business_service::delete_business(&pool, &auth, business_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public storefront: business, logo, cover and active products.
pub async fn get_storefront(
    State(pool): State<DbPool>,
    Path(slug): Path<String>,
) -> Result<Json<StorefrontResponse>, AppError> {
    Ok(Json(business_service::get_storefront(&pool, &slug).await?))
}
