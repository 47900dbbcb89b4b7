//! Payment handlers.
//!
//! - GET /api/v1/businesses/{id}/payments - Payment history (owner)
//! - POST /api/v1/payments/webhook - Provider notifications (public, signed)

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::payment::Payment,
    services::payment_service::{self, InboundWebhook, WebhookOutcome},
    state::AppState,
};

pub async fn list_payments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(
        payment_service::list_payments(&pool, &auth, business_id).await?,
    ))
}

/// Query string sent by the provider alongside the notification.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

/// Receive a payment notification.
///
/// The body is read raw. The `x-signature` header is verified before the
/// body is decoded or anything is stored.
///
/// # Headers
///
/// - `x-signature`: `ts=<unix>,v1=<hex hmac>`
/// - `x-request-id`: part of the signed manifest
///
/// # Response
///
/// - **200 OK**: `{"result": "applied" | "unchanged" | "ignored" | "duplicate", ...}`
/// - **400**: correctly signed but the body is not a notification
/// - **401**: bad or missing signature
pub async fn receive_notification(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let inbound = InboundWebhook {
        signature: header("x-signature"),
        request_id: header("x-request-id"),
        query_resource_id: query.data_id.as_deref(),
        body: &body,
    };

    let outcome = payment_service::handle_webhook(
        &state.pool,
        &state.checkout,
        &state.config.checkout_webhook_secret,
        inbound,
    )
    .await?;

    Ok(Json(outcome))
}
