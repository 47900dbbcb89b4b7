//! Plan purchases and the payment status lifecycle.
//!
//! # Flow
//!
//! 1. `upgrade_plan` records a `pending` payment and opens a hosted checkout
//! 2. The buyer pays on the provider's page
//! 3. The provider notifies `/api/v1/payments/webhook`
//! 4. `handle_webhook` verifies it, stores it, fetches the payment from the
//!    provider and applies `pending → approved | rejected`
//! 5. Approval activates the plan in the same database transaction
//!
//! # Redelivery
//!
//! Notifications are keyed by provider event id. A redelivered event that was
//! already processed is acknowledged without side effects; one whose
//! processing failed is processed again.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        payment::{CheckoutResponse, Payment, PaymentStatus, Transition},
        plan::PlanTier,
        webhook::{ProviderNotification, SignatureHeader, WebhookEvent, verify_signature},
    },
    services::{business_service, checkout_client::CheckoutClient, plan_service},
};

/// Start a plan purchase.
///
/// # Errors
///
/// - `InvalidRequest`: the FREE tier cannot be bought
/// - `Gateway`: the checkout could not be created; the payment is rejected
pub async fn upgrade_plan(
    pool: &DbPool,
    checkout: &CheckoutClient,
    currency: &str,
    auth: &AuthContext,
    business_id: Uuid,
    tier: PlanTier,
) -> Result<CheckoutResponse, AppError> {
    business_service::load_owned(pool, auth, business_id).await?;

    if !tier.is_paid() {
        return Err(AppError::InvalidRequest(
            "Only paid tiers can be purchased".to_string(),
        ));
    }
    let plan = plan_service::plan_by_tier(pool, tier).await?;

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (business_id, tier, amount_cents, currency, status)
        VALUES ($1, $2, $3, $4, 'pending')
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(tier.as_str())
    .bind(plan.price_cents)
    .bind(currency)
    .fetch_one(pool)
    .await?;

    let preference = match checkout.create_preference(&payment, &plan).await {
        Ok(preference) => preference,
        Err(e) => {
            tracing::error!(payment_id = %payment.id, error = %e, "checkout creation failed");
            sqlx::query("UPDATE payments SET status = 'rejected', updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .execute(pool)
                .await?;
            return Err(e);
        }
    };

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET preference_id = $2, checkout_url = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payment.id)
    .bind(&preference.id)
    .bind(&preference.init_point)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        business_id = %business_id,
        tier = %tier,
        "checkout created"
    );

    Ok(CheckoutResponse {
        payment,
        checkout_url: preference.init_point,
    })
}

pub async fn list_payments(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
) -> Result<Vec<Payment>, AppError> {
    business_service::load_owned(pool, auth, business_id).await?;

    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE business_id = $1 ORDER BY created_at DESC",
    )
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    Ok(payments)
}

pub async fn list_all_payments(
    pool: &DbPool,
    status: Option<PaymentStatus>,
) -> Result<Vec<Payment>, AppError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC LIMIT 500",
    )
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    Ok(payments)
}

pub async fn list_webhook_events(pool: &DbPool) -> Result<Vec<WebhookEvent>, AppError> {
    let events = sqlx::query_as::<_, WebhookEvent>(
        "SELECT * FROM webhook_events ORDER BY received_at DESC LIMIT 200",
    )
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// Move a payment to `next`, activating the plan on approval.
///
/// The payment row is locked for the whole transition.
pub async fn apply_payment_status(
    pool: &DbPool,
    payment_id: Uuid,
    next: PaymentStatus,
    provider_payment_id: Option<&str>,
) -> Result<(Payment, Transition), AppError> {
    let mut tx = pool.begin().await?;

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("payment"))?;

    let transition = match payment.status().transition(next) {
        Ok(t) => t,
        Err((from, to)) => {
            tx.rollback().await?;
            return Err(AppError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    };

    let Transition::Apply(status) = transition else {
        tx.commit().await?;
        return Ok((payment, transition));
    };

    let updated = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = $2,
            provider_payment_id = COALESCE($3, provider_payment_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(payment_id)
    .bind(status.as_str())
    .bind(provider_payment_id)
    .fetch_one(&mut *tx)
    .await?;

    if status == PaymentStatus::Approved {
        let tier: PlanTier = updated
            .tier
            .parse()
            .map_err(|e: String| AppError::InvalidRequest(e))?;
        plan_service::apply_approved_payment(&mut tx, updated.business_id, tier).await?;
    }

    tx.commit().await?;

    tracing::info!(
        payment_id = %payment_id,
        business_id = %updated.business_id,
        status = %status,
        "payment status changed"
    );

    Ok((updated, transition))
}

/// What happened to a notification.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A payment changed status
    Applied { payment_id: Uuid, status: PaymentStatus },
    /// The payment was already in the reported status
    Unchanged { payment_id: Uuid },
    /// Not a payment notification, or not one of ours
    Ignored { reason: String },
    /// Already processed earlier
    Duplicate,
}

/// Inputs of an inbound notification, already pulled out of the request.
pub struct InboundWebhook<'a> {
    pub signature: Option<&'a str>,
    pub request_id: Option<&'a str>,
    /// `data.id` passed as a query parameter, used when the body lacks it
    pub query_resource_id: Option<&'a str>,
    pub body: &'a [u8],
}

/// Verify the signature of an inbound notification and decode it.
///
/// The `x-signature` header is checked before the body is decoded, so an
/// unsigned or forged request is a 401 whatever its body. The signed
/// manifest uses the body's `data.id`, or the `data.id` query parameter when
/// the body has none or cannot be read. Nothing is written before this
/// succeeds.
pub fn authenticate_webhook(
    secret: &str,
    inbound: &InboundWebhook<'_>,
) -> Result<(ProviderNotification, serde_json::Value, String), AppError> {
    let header = inbound
        .signature
        .and_then(SignatureHeader::parse)
        .ok_or(AppError::InvalidSignature)?;

    let decoded = serde_json::from_slice::<serde_json::Value>(inbound.body)
        .and_then(|payload| {
            serde_json::from_value::<ProviderNotification>(payload.clone())
                .map(|notification| (notification, payload))
        });

    let resource_id = decoded
        .as_ref()
        .ok()
        .and_then(|(notification, _)| notification.resource_id())
        .or_else(|| inbound.query_resource_id.map(str::to_string))
        .unwrap_or_default();

    if !verify_signature(secret, &header, &resource_id, inbound.request_id.unwrap_or("")) {
        tracing::warn!(resource_id = %resource_id, "webhook signature mismatch");
        return Err(AppError::InvalidSignature);
    }

    let (notification, payload) = decoded
        .map_err(|e| AppError::InvalidRequest(format!("Malformed notification: {e}")))?;

    Ok((notification, payload, resource_id))
}

/// Verify, record and process a provider notification.
pub async fn handle_webhook(
    pool: &DbPool,
    checkout: &CheckoutClient,
    secret: &str,
    inbound: InboundWebhook<'_>,
) -> Result<WebhookOutcome, AppError> {
    let (notification, payload, resource_id) = authenticate_webhook(secret, &inbound)?;
    let kind = notification.kind();

    // Returns a row for new events and for earlier ones that failed
    let event_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO webhook_events (provider_event_id, event_type, resource_id, payload)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (provider_event_id) DO UPDATE
            SET payload = EXCLUDED.payload, error = NULL
            WHERE webhook_events.processed_at IS NULL
        RETURNING id
        "#,
    )
    .bind(notification.dedupe_key())
    .bind(&kind)
    .bind(Some(resource_id.as_str()).filter(|r| !r.is_empty()))
    .bind(&payload)
    .fetch_optional(pool)
    .await?;

    let Some(event_id) = event_id else {
        tracing::debug!(event = %notification.dedupe_key(), "duplicate webhook");
        return Ok(WebhookOutcome::Duplicate);
    };

    let result = if kind == "payment" && !resource_id.is_empty() {
        process_payment_notification(pool, checkout, &resource_id).await
    } else {
        Ok(WebhookOutcome::Ignored {
            reason: format!("unhandled event type '{kind}'"),
        })
    };

    match result {
        Ok(outcome) => {
            mark_event(pool, event_id, None, true).await?;
            Ok(outcome)
        }
        Err(e @ AppError::InvalidTransition { .. }) => {
            // Final payments never change again; retrying would not help
            tracing::warn!(event_id = %event_id, error = %e, "webhook refused by payment lifecycle");
            mark_event(pool, event_id, Some(e.to_string()), true).await?;
            Ok(WebhookOutcome::Ignored {
                reason: e.to_string(),
            })
        }
        Err(e) => {
            tracing::error!(event_id = %event_id, error = %e, "webhook processing failed");
            mark_event(pool, event_id, Some(e.to_string()), false).await?;
            Err(e)
        }
    }
}

async fn process_payment_notification(
    pool: &DbPool,
    checkout: &CheckoutClient,
    provider_payment_id: &str,
) -> Result<WebhookOutcome, AppError> {
    let remote = checkout.get_payment(provider_payment_id).await?;

    let Some(payment_id) = remote
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r).ok())
    else {
        tracing::warn!(provider_payment_id, "payment without a local reference");
        return Ok(WebhookOutcome::Ignored {
            reason: "missing external_reference".to_string(),
        });
    };

    let next = PaymentStatus::from_provider(&remote.status);

    match apply_payment_status(pool, payment_id, next, Some(provider_payment_id)).await {
        Ok((payment, Transition::Apply(status))) => Ok(WebhookOutcome::Applied {
            payment_id: payment.id,
            status,
        }),
        Ok((payment, Transition::Unchanged)) => Ok(WebhookOutcome::Unchanged {
            payment_id: payment.id,
        }),
        Err(AppError::NotFound(_)) => {
            tracing::warn!(%payment_id, "notification for unknown payment");
            Ok(WebhookOutcome::Ignored {
                reason: "unknown payment".to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

async fn mark_event(
    pool: &DbPool,
    event_id: Uuid,
    error: Option<String>,
    processed: bool,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE webhook_events
        SET processed_at = CASE WHEN $3 THEN NOW() ELSE NULL END,
            error = $2
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(error)
    .bind(processed)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::webhook::{sign_manifest, signature_manifest};

    const BODY: &[u8] = br#"{"id": 777, "type": "payment", "action": "payment.updated", "data": {"id": "555"}}"#;

    fn signed(secret: &str, resource: &str, request_id: &str) -> String {
        let ts = "1704908010";
        format!(
            "ts={ts},v1={}",
            sign_manifest(secret, &signature_manifest(resource, request_id, ts))
        )
    }

    #[test]
    fn valid_signature_authenticates() {
        let signature = signed("whsec", "555", "req-9");
        let inbound = InboundWebhook {
            signature: Some(&signature),
            request_id: Some("req-9"),
            query_resource_id: None,
            body: BODY,
        };

        let (notification, payload, resource) = authenticate_webhook("whsec", &inbound).unwrap();
        assert_eq!(resource, "555");
        assert_eq!(notification.dedupe_key(), "777");
        assert_eq!(payload["type"], "payment");
    }

    #[test]
    fn missing_or_wrong_signature_is_rejected() {
        let inbound = InboundWebhook {
            signature: None,
            request_id: Some("req-9"),
            query_resource_id: None,
            body: BODY,
        };
        assert!(matches!(
            authenticate_webhook("whsec", &inbound),
            Err(AppError::InvalidSignature)
        ));

        let signature = signed("other-secret", "555", "req-9");
        let inbound = InboundWebhook {
            signature: Some(&signature),
            ..inbound
        };
        assert!(matches!(
            authenticate_webhook("whsec", &inbound),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn resource_id_falls_back_to_query() {
        let body = br#"{"type": "payment"}"#;
        let signature = signed("whsec", "42", "");
        let inbound = InboundWebhook {
            signature: Some(&signature),
            request_id: None,
            query_resource_id: Some("42"),
            body,
        };
        let (_, _, resource) = authenticate_webhook("whsec", &inbound).unwrap();
        assert_eq!(resource, "42");
    }

    #[test]
    fn unsigned_garbage_is_rejected_before_parsing() {
        let inbound = InboundWebhook {
            signature: None,
            request_id: None,
            query_resource_id: None,
            body: b"not json",
        };
        assert!(matches!(
            authenticate_webhook("whsec", &inbound),
            Err(AppError::InvalidSignature)
        ));

        let inbound = InboundWebhook {
            signature: Some("ts=1,v1=00"),
            ..inbound
        };
        assert!(matches!(
            authenticate_webhook("whsec", &inbound),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn signed_malformed_body_is_a_bad_request() {
        let signature = signed("whsec", "555", "req-1");
        let inbound = InboundWebhook {
            signature: Some(&signature),
            request_id: Some("req-1"),
            query_resource_id: Some("555"),
            body: b"not json",
        };
        assert!(matches!(
            authenticate_webhook("whsec", &inbound),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = WebhookOutcome::Duplicate;
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"result": "duplicate"})
        );
    }
}
