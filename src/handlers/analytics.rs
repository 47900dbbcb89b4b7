//! Analytics handlers.
//!
//! - POST /api/v1/analytics/events - Record a view or contact click (public)
//! - GET /api/v1/businesses/{id}/analytics?days=30 - Owner summary

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::analytics::{AnalyticsSummary, RecordEventRequest, SummaryQuery},
    services::analytics_service,
};

/// Returns 202 Accepted with no body.
pub async fn record_event(
    State(pool): State<DbPool>,
    Json(request): Json<RecordEventRequest>,
) -> Result<StatusCode, AppError> {
    analytics_service::record_event(&pool, request).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn get_summary(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let days = query.window().map_err(AppError::InvalidRequest)?;
    Ok(Json(
        analytics_service::summary(&pool, &auth, business_id, days).await?,
    ))
}
