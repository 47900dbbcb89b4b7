//! Public search over published businesses and their products.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        business::BusinessListing,
        explore::{BusinessSearchQuery, Page, ProductSearchQuery},
        product::ProductListing,
    },
    services::explore_service,
};

/// `GET /api/v1/explore/businesses?q=&category=&city=&page=&per_page=`
pub async fn search_businesses(
    State(pool): State<DbPool>,
    Query(query): Query<BusinessSearchQuery>,
) -> Result<Json<Page<BusinessListing>>, AppError> {
    Ok(Json(explore_service::search_businesses(&pool, query).await?))
}

/// `GET /api/v1/explore/products?q=&category=&business=&min_price=&max_price=&page=&per_page=`
pub async fn search_products(
    State(pool): State<DbPool>,
    Query(query): Query<ProductSearchQuery>,
) -> Result<Json<Page<ProductListing>>, AppError> {
    Ok(Json(explore_service::search_products(&pool, query).await?))
}
