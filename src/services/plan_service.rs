//! Plan catalog, per-business plan state, trials and expiry.
//!
//! Expired paid plans fall back to FREE in two places: lazily whenever a
//! plan is read, and in a periodic sweep so dashboards and search ranking
//! stay correct for businesses nobody is looking at.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::{PgConnection, postgres::PgExecutor};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::plan::{
        CurrentPlan, Plan, PlanStatus, PlanTier, PlanUsageResponse, check_trial_allowed,
        next_expiry,
    },
};

pub async fn list_plans(pool: &DbPool) -> Result<Vec<Plan>, AppError> {
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY price_cents")
        .fetch_all(pool)
        .await?;
    Ok(plans)
}

pub async fn plan_by_tier<'e, E: PgExecutor<'e>>(executor: E, tier: PlanTier) -> Result<Plan, AppError> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE tier = $1")
        .bind(tier.as_str())
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("plan"))
}

/// Insert the FREE plan row every new business starts with.
pub async fn create_free_plan(
    conn: &mut PgConnection,
    business_id: Uuid,
) -> Result<CurrentPlan, AppError> {
    let plan = sqlx::query_as::<_, CurrentPlan>(
        "INSERT INTO current_plans (business_id, tier, status) VALUES ($1, 'free', 'active') RETURNING *",
    )
    .bind(business_id)
    .fetch_one(conn)
    .await?;
    Ok(plan)
}

/// Downgrade expired paid plans to FREE and unfeature their products.
///
/// Limited to one business when `business_id` is given. Returns the ids of
/// the businesses that were downgraded.
async fn downgrade_expired(
    conn: &mut PgConnection,
    business_id: Option<Uuid>,
) -> Result<Vec<Uuid>, AppError> {
    let downgraded: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE current_plans
        SET tier = 'free',
            status = 'active',
            started_at = NOW(),
            expires_at = NULL,
            updated_at = NOW()
        WHERE tier <> 'free'
          AND expires_at <= NOW()
          AND ($1::UUID IS NULL OR business_id = $1)
        RETURNING business_id
        "#,
    )
    .bind(business_id)
    .fetch_all(&mut *conn)
    .await?;

    if !downgraded.is_empty() {
        sqlx::query("UPDATE products SET is_featured = false WHERE business_id = ANY($1) AND is_featured")
            .bind(&downgraded)
            .execute(&mut *conn)
            .await?;

        for id in &downgraded {
            tracing::info!(business_id = %id, "plan expired, downgraded to free");
        }
    }

    Ok(downgraded)
}

/// Current plan of a business, downgrading it first if it lapsed.
pub async fn current_plan(pool: &DbPool, business_id: Uuid) -> Result<CurrentPlan, AppError> {
    let plan = sqlx::query_as::<_, CurrentPlan>("SELECT * FROM current_plans WHERE business_id = $1")
        .bind(business_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("plan"))?;

    if !plan.is_expired(Utc::now()) {
        return Ok(plan);
    }

    let mut tx = pool.begin().await?;
    downgrade_expired(&mut tx, Some(business_id)).await?;
    let plan = sqlx::query_as::<_, CurrentPlan>("SELECT * FROM current_plans WHERE business_id = $1")
        .bind(business_id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(plan)
}

/// Lock the plan row for the rest of the transaction.
///
/// Quota checks and counter updates must happen under this lock so two
/// concurrent uploads cannot both take the last slot.
pub async fn lock_current_plan(
    conn: &mut PgConnection,
    business_id: Uuid,
) -> Result<(CurrentPlan, Plan), AppError> {
    let mut current = sqlx::query_as::<_, CurrentPlan>(
        "SELECT * FROM current_plans WHERE business_id = $1 FOR UPDATE",
    )
    .bind(business_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("plan"))?;

    if current.is_expired(Utc::now()) {
        downgrade_expired(&mut *conn, Some(business_id)).await?;
        current = sqlx::query_as::<_, CurrentPlan>("SELECT * FROM current_plans WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(&mut *conn)
            .await?;
    }

    let limits = plan_by_tier(&mut *conn, current.tier()).await?;
    Ok((current, limits))
}

pub async fn plan_usage(pool: &DbPool, business_id: Uuid) -> Result<PlanUsageResponse, AppError> {
    let current = current_plan(pool, business_id).await?;
    let limits = plan_by_tier(pool, current.tier()).await?;
    Ok(PlanUsageResponse { current, limits })
}

/// Start the one-time PREMIUM trial.
///
/// # Errors
///
/// - `Conflict`: trial already used, or a paid plan is active
pub async fn activate_trial(
    pool: &DbPool,
    business_id: Uuid,
    trial_days: i64,
) -> Result<CurrentPlan, AppError> {
    let mut tx = pool.begin().await?;
    let (current, _) = lock_current_plan(&mut tx, business_id).await?;

    check_trial_allowed(&current, Utc::now()).map_err(AppError::Conflict)?;

    let expires_at = Utc::now() + ChronoDuration::days(trial_days);
    let plan = sqlx::query_as::<_, CurrentPlan>(
        r#"
        UPDATE current_plans
        SET tier = $2,
            status = $3,
            started_at = NOW(),
            expires_at = $4,
            trial_used = true,
            updated_at = NOW()
        WHERE business_id = $1
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(PlanTier::Premium.as_str())
    .bind(PlanStatus::Trial.as_str())
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(business_id = %business_id, %expires_at, "trial activated");
    Ok(plan)
}

/// Activate (or extend) a paid plan after its payment was approved.
///
/// Runs inside the caller's transaction so the payment status and the plan
/// change commit together.
pub async fn apply_approved_payment(
    conn: &mut PgConnection,
    business_id: Uuid,
    tier: PlanTier,
) -> Result<CurrentPlan, AppError> {
    let (current, _) = lock_current_plan(&mut *conn, business_id).await?;
    let limits = plan_by_tier(&mut *conn, tier).await?;

    let now = Utc::now();
    let expires_at = next_expiry(&current, tier, limits.duration_days, now);
    let renewing = current.tier() == tier && current.status == PlanStatus::Active.as_str();

    let plan = sqlx::query_as::<_, CurrentPlan>(
        r#"
        UPDATE current_plans
        SET tier = $2,
            status = $3,
            started_at = CASE WHEN $5 THEN started_at ELSE NOW() END,
            expires_at = $4,
            updated_at = NOW()
        WHERE business_id = $1
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(tier.as_str())
    .bind(PlanStatus::Active.as_str())
    .bind(expires_at)
    .bind(renewing)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(business_id = %business_id, tier = %tier, %expires_at, renewing, "paid plan applied");
    Ok(plan)
}

/// Downgrade every expired plan. Returns how many were downgraded.
pub async fn expire_plans(pool: &DbPool) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;
    let downgraded = downgrade_expired(&mut tx, None).await?;
    tx.commit().await?;
    Ok(downgraded.len())
}

/// Run [`expire_plans`] on a fixed interval for the lifetime of the process.
pub fn spawn_expiry_sweeper(pool: DbPool, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match expire_plans(&pool).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "expired plans downgraded"),
                Err(e) => tracing::error!(error = %e, "plan expiry sweep failed"),
            }
        }
    })
}
