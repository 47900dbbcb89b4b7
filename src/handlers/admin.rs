//! Admin-only endpoints. Every route here sits behind `require_admin`.
//!
//! - GET /api/v1/admin/stats
//! - GET /api/v1/admin/businesses?include_inactive=true
//! - PUT /api/v1/admin/businesses/{id}/active
//! - PUT /api/v1/admin/businesses/{id}/verified
//! - GET /api/v1/admin/payments?status=pending
//! - GET /api/v1/admin/webhook-events
//! - POST /api/v1/admin/categories, PATCH|DELETE /api/v1/admin/categories/{id}

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        business::Business,
        payment::{Payment, PaymentListQuery},
        webhook::WebhookEvent,
    },
    services::{
        admin_service::{self, DashboardStats},
        business_service, payment_service,
    },
};

pub async fn get_stats(State(pool): State<DbPool>) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(admin_service::dashboard_stats(&pool).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BusinessListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_businesses(
    State(pool): State<DbPool>,
    Query(query): Query<BusinessListQuery>,
) -> Result<Json<Vec<Business>>, AppError> {
    Ok(Json(
        business_service::list_all(&pool, query.include_inactive).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SetFlagRequest {
    pub value: bool,
}

/// Suspend or restore a business.
///
/// # Request Body
///
/// ```json
/// { "value": false }
/// ```
pub async fn set_business_active(
    State(pool): State<DbPool>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<SetFlagRequest>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(
        business_service::set_active(&pool, business_id, request.value).await?,
    ))
}

pub async fn set_business_verified(
    State(pool): State<DbPool>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<SetFlagRequest>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(
        business_service::set_verified(&pool, business_id, request.value).await?,
    ))
}

pub async fn list_payments(
    State(pool): State<DbPool>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(
        payment_service::list_all_payments(&pool, query.status).await?,
    ))
}

pub async fn list_webhook_events(
    State(pool): State<DbPool>,
) -> Result<Json<Vec<WebhookEvent>>, AppError> {
    Ok(Json(payment_service::list_webhook_events(&pool).await?))
}
