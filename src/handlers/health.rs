//! Liveness and readiness check.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{db::DbPool, error::AppError};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Seeded plan tiers; zero means migrations have not run
    pub plans: i64,
    pub checked_at: DateTime<Utc>,
}

/// `GET /health`
///
/// ```json
/// { "status": "ok", "version": "0.1.0", "plans": 3, "checked_at": "2026-01-10T12:00:00Z" }
/// ```
///
/// An unreachable database yields the standard 500 error body.
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    let plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
        .fetch_one(&pool)
        .await?;

    Ok(Json(HealthResponse {
        status: if plans > 0 { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        plans,
        checked_at: Utc::now(),
    }))
}
