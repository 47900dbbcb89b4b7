//! Category handlers: public listing and admin management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::category::{Category, CategoryRequest},
    services::category_service,
};

pub async fn list_categories(State(pool): State<DbPool>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(category_service::list_categories(&pool).await?))
}

pub async fn create_category(
    State(pool): State<DbPool>,
    Json(request): Json<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = category_service::create_category(&pool, request).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(pool): State<DbPool>,
    Path(category_id): Path<Uuid>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(
        category_service::update_category(&pool, category_id, request).await?,
    ))
}

/// Returns 409 while businesses or products still use the category.
pub async fn delete_category(
    State(pool): State<DbPool>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    category_service::delete_category(&pool, category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
