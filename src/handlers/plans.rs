//! Plan handlers.
//!
//! - GET /api/v1/plans - Plan catalog (public)
//! - GET /api/v1/businesses/{id}/plan - Current plan, usage and limits
//! - POST /api/v1/businesses/{id}/plan/trial - Start the PREMIUM trial
//! - POST /api/v1/businesses/{id}/plan/upgrade - Buy a paid plan

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
    models::{
        payment::CheckoutResponse,
        plan::{CurrentPlan, Plan, PlanUsageResponse, UpgradePlanRequest},
    },
    services::{business_service, payment_service, plan_service},
    state::AppState,
};

pub async fn list_plans(State(pool): State<DbPool>) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(plan_service::list_plans(&pool).await?))
}

pub async fn get_plan(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<PlanUsageResponse>, AppError> {
    business_service::load_owned(&pool, &auth, business_id).await?;
    Ok(Json(plan_service::plan_usage(&pool, business_id).await?))
}

/// Start the one-time PREMIUM trial.
///
/// # Response
///
/// - **200 OK**: the updated plan (`status: "trial"`)
/// - **409**: trial already used, or a paid plan is active
pub async fn activate_trial(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<CurrentPlan>, AppError> {
    business_service::load_owned(&state.pool, &auth, business_id).await?;
    Ok(Json(
        plan_service::activate_trial(&state.pool, business_id, state.config.trial_days).await?,
    ))
}

/// Buy a paid plan.
///
/// # Request Body
///
/// ```json
/// { "tier": "premium" }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "payment": { "id": "...", "status": "pending", "amount_cents": 19900, ... },
///   "checkout_url": "https://checkout.provider/..."
/// }
/// ```
///
/// The plan changes only when the provider confirms the payment.
pub async fn upgrade_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
    Json(request): Json<UpgradePlanRequest>,
) -> Result<impl IntoResponse, AppError> {
    let checkout: CheckoutResponse = payment_service::upgrade_plan(
        &state.pool,
        &state.checkout,
        &state.config.checkout_currency,
        &auth,
        business_id,
        request.tier,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(checkout)))
}
