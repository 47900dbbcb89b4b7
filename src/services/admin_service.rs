//! Marketplace-wide figures for the admin dashboard.

use serde::Serialize;

use crate::{db::DbPool, error::AppError};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub users: i64,
    pub businesses: i64,
    pub published_businesses: i64,
    pub products: i64,
    pub paid_plans: i64,
    pub pending_payments: i64,
    pub approved_revenue_cents: i64,
}

pub async fn dashboard_stats(pool: &DbPool) -> Result<DashboardStats, AppError> {
    let stats = sqlx::query_as::<_, DashboardStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM businesses WHERE is_active) AS businesses,
            (SELECT COUNT(*) FROM businesses WHERE is_active AND is_published) AS published_businesses,
            (SELECT COUNT(*) FROM products WHERE is_active) AS products,
            (SELECT COUNT(*) FROM current_plans WHERE tier <> 'free') AS paid_plans,
            (SELECT COUNT(*) FROM payments WHERE status = 'pending') AS pending_payments,
            (SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments WHERE status = 'approved')
                AS approved_revenue_cents
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
