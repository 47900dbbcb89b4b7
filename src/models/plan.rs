//! Subscription plans and per-business plan state.
//!
//! # Tiers
//!
//! | tier    | products | images/product | period  |
//! |---------|----------|----------------|---------|
//! | free    | 10       | 1              | forever |
//! | basic   | 50       | 3              | 30 days |
//! | premium | 500      | 8              | 30 days |
//!
//! The numbers live in the seeded `plans` table; this module only holds the
//! rules that apply them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Basic,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "basic" => Ok(PlanTier::Basic),
            "premium" => Ok(PlanTier::Premium),
            other => Err(format!("unknown plan tier '{other}'")),
        }
    }
}

/// How the current plan was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Trial,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Trial => "trial",
        }
    }
}

/// Row from the `plans` catalog.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Plan {
    pub id: Uuid,
    pub tier: String,
    pub name: String,
    pub price_cents: i64,
    pub max_products: i32,
    pub max_images_per_product: i32,

    /// Length of one paid period; 0 means the plan never expires
    pub duration_days: i32,
}

/// Row from `current_plans`: the plan a business is on right now plus its
/// usage counters.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CurrentPlan {
    pub id: Uuid,
    pub business_id: Uuid,
    pub tier: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,

    /// A business gets exactly one trial
    pub trial_used: bool,

    pub product_count: i32,
    pub image_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl CurrentPlan {
    pub fn tier(&self) -> PlanTier {
        self.tier.parse().unwrap_or(PlanTier::Free)
    }

    /// Whether the plan has lapsed and should fall back to FREE.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.tier().is_paid() && self.expires_at.is_some_and(|at| at <= now)
    }

    /// Paid plan that has not expired yet (trials count).
    pub fn has_active_paid_plan(&self, now: DateTime<Utc>) -> bool {
        self.tier().is_paid() && !self.is_expired(now)
    }
}

/// Current plan with the limits of its tier.
#[derive(Debug, Serialize)]
pub struct PlanUsageResponse {
    pub current: CurrentPlan,
    pub limits: Plan,
}

/// Body of `POST /api/v1/businesses/{id}/plan/upgrade`.
#[derive(Debug, Deserialize)]
pub struct UpgradePlanRequest {
    pub tier: PlanTier,
}

/// Check whether one more product fits in the plan.
pub fn check_product_quota(limits: &Plan, current: &CurrentPlan) -> Result<(), String> {
    if current.product_count >= limits.max_products {
        return Err(format!(
            "The {} plan allows {} products; upgrade to add more",
            limits.name, limits.max_products
        ));
    }
    Ok(())
}

/// Check whether one more image fits on a product.
pub fn check_image_quota(limits: &Plan, images_on_product: i64) -> Result<(), String> {
    if images_on_product >= i64::from(limits.max_images_per_product) {
        return Err(format!(
            "The {} plan allows {} images per product",
            limits.name, limits.max_images_per_product
        ));
    }
    Ok(())
}

/// Expiry for a newly approved paid period.
///
/// Renewing the tier the business is already on extends from the current
/// expiry, so paying early never loses days. Any other change starts from now.
pub fn next_expiry(
    current: &CurrentPlan,
    tier: PlanTier,
    duration_days: i32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match current.expires_at {
        Some(at)
            if current.tier() == tier
                && current.status == PlanStatus::Active.as_str()
                && at > now =>
        {
            at
        }
        _ => now,
    };
    base + Duration::days(i64::from(duration_days))
}

/// Whether the business may start its one trial right now.
pub fn check_trial_allowed(current: &CurrentPlan, now: DateTime<Utc>) -> Result<(), String> {
    if current.trial_used {
        return Err("The trial has already been used for this business".to_string());
    }
    if current.has_active_paid_plan(now) {
        return Err("A paid plan is already active".to_string());
    }
    Ok(())
}
