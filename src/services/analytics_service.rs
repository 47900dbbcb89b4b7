//! Storefront analytics: recording and in-memory aggregation.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::analytics::{
        AnalyticsSummary, EventRow, RecordEventRequest, aggregate, window_start,
    },
    services::business_service,
};

/// Record one public interaction with a storefront or product.
pub async fn record_event(pool: &DbPool, request: RecordEventRequest) -> Result<(), AppError> {
    business_service::load_public(pool, request.business_id).await?;

    if let Some(product_id) = request.product_id {
        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND business_id = $2 AND is_active = true)",
        )
        .bind(product_id)
        .bind(request.business_id)
        .fetch_one(pool)
        .await?;
        if !belongs {
            return Err(AppError::NotFound("product"));
        }
    }

    sqlx::query("INSERT INTO analytics_events (business_id, product_id, kind) VALUES ($1, $2, $3)")
        .bind(request.business_id)
        .bind(request.product_id)
        .bind(request.kind.as_str())
        .execute(pool)
        .await?;

    Ok(())
}

/// Totals, daily series and top products for the last `days` days.
pub async fn summary(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    days: i64,
) -> Result<AnalyticsSummary, AppError> {
    business_service::load_owned(pool, auth, business_id).await?;

    let now = Utc::now();
    let events = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT e.product_id, p.name AS product_name, e.kind, e.created_at
        FROM analytics_events e
        LEFT JOIN products p ON p.id = e.product_id
        WHERE e.business_id = $1 AND e.created_at >= $2
        "#,
    )
    .bind(business_id)
    .bind(window_start(days, now))
    .fetch_all(pool)
    .await?;

    Ok(aggregate(&events, days, now))
}
