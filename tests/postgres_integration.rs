//! Integration tests against a real Postgres.
//!
//! Enabled with the `test-postgres` feature. Two modes:
//! - `TEST_DATABASE_URL` set: use that database (CI service container)
//! - otherwise: start a Postgres container with testcontainers (requires docker)
//!
//! Every test registers its own owner and business, so tests can share one
//! database and run in parallel.

#![cfg(feature = "test-postgres")]

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};
use chrono::Duration;
use local_market_server::{
    config::Config,
    db::{self, DbPool},
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        image::{ImageKind, object_key},
        payment::{PaymentStatus, Transition},
        plan::{CurrentPlan, PlanTier},
        user::UserRole,
        webhook::{sign_manifest, signature_manifest},
    },
    services::{
        business_service, category_service, checkout_client::CheckoutClient,
        payment_service::{self, InboundWebhook, WebhookOutcome},
        plan_service, product_service,
        storage::ObjectStorage,
        upload_service, user_service,
    },
};
use object_store::{ObjectStore, PutPayload, memory::InMemory, path::Path};
use serde_json::json;
use testcontainers::{ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec-test";

/// Holds the pool and, in local mode, the container it points at.
/// The container must outlive the test.
struct TestDb {
    pool: DbPool,
    config: Config,
    _container: Option<testcontainers::ContainerAsync<Postgres>>,
}

async fn setup() -> TestDb {
    let (url, container) = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => (url, None),
        Err(_) => {
            let container = Postgres::default()
                .with_tag("16-alpine")
                .start()
                .await
                .expect("Failed to start Postgres container");
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            (
                format!("postgres://postgres:postgres@{host}:{port}/postgres"),
                Some(container),
            )
        }
    };

    let pool = db::create_pool(&url, 10).await.expect("Failed to connect to Postgres");
    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let config = Config::from_pairs([
        ("DATABASE_URL", url.as_str()),
        ("CHECKOUT_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("STORAGE_ENDPOINT", "http://localhost:9000"),
        ("STORAGE_ACCESS_KEY", "minio"),
        ("STORAGE_SECRET_KEY", "minio-secret"),
    ])
    .unwrap();

    TestDb {
        pool,
        config,
        _container: container,
    }
}

async fn register_owner(pool: &DbPool) -> AuthContext {
    let request = serde_json::from_value(json!({
        "email": format!("{}@example.com", Uuid::new_v4().simple()),
        "display_name": "Owner",
    }))
    .unwrap();
    let issued = user_service::register_user(pool, request).await.unwrap();
    AuthContext {
        user_id: issued.user.id,
        role: UserRole::User,
    }
}

async fn create_business(pool: &DbPool, auth: &AuthContext) -> Uuid {
    let request = serde_json::from_value(json!({
        "name": format!("Panaderia {}", Uuid::new_v4().simple()),
        "city": "Rosario",
    }))
    .unwrap();
    business_service::create_business(pool, auth.user_id, request)
        .await
        .unwrap()
        .business
        .id
}

async fn create_product(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    category_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    let request = serde_json::from_value(json!({
        "name": "Pan de campo",
        "price_cents": 1500,
        "category_id": category_id,
    }))
    .unwrap();
    product_service::create_product(pool, auth, business_id, request)
        .await
        .map(|p| p.id)
}

async fn plan_of(pool: &DbPool, business_id: Uuid) -> CurrentPlan {
    plan_service::current_plan(pool, business_id).await.unwrap()
}

async fn insert_pending_payment(pool: &DbPool, business_id: Uuid, tier: PlanTier) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO payments (business_id, tier, amount_cents, currency, status) VALUES ($1, $2, 9900, 'ARS', 'pending') RETURNING id",
    )
    .bind(business_id)
    .bind(tier.as_str())
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Storage whose HEAD lookups hit an in-memory bucket.
fn storage_with(config: &Config, memory: Arc<InMemory>) -> ObjectStorage {
    ObjectStorage::from_config(config).unwrap().with_objects(memory)
}

async fn put_object(memory: &InMemory, key: &str, size: usize) {
    memory
        .put(&Path::from(key), PutPayload::from(vec![7u8; size]))
        .await
        .unwrap();
}

async fn complete(
    pool: &DbPool,
    storage: &ObjectStorage,
    auth: &AuthContext,
    business_id: Uuid,
    kind: ImageKind,
    product_id: Option<Uuid>,
    key: &str,
) -> Result<Uuid, AppError> {
    let request = serde_json::from_value(json!({
        "kind": kind,
        "product_id": product_id,
        "object_key": key,
        "content_type": "image/jpeg",
        "size_bytes": 4096,
    }))
    .unwrap();
    upload_service::complete_upload(pool, storage, auth, business_id, request)
        .await
        .map(|image| image.id)
}

fn signature_for(resource_id: &str, request_id: &str) -> String {
    let ts = "1704908010";
    let v1 = sign_manifest(WEBHOOK_SECRET, &signature_manifest(resource_id, request_id, ts));
    format!("ts={ts},v1={v1}")
}

#[tokio::test]
async fn test_product_quota_holds_under_concurrent_creates() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    // FREE allows 10 products
    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let pool = db.pool.clone();
            let auth = auth.clone();
            tokio::spawn(async move { create_product(&pool, &auth, business_id, None).await })
        })
        .collect();

    let (mut created, mut refused) = (0, 0);
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::QuotaExceeded(_)) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!((created, refused), (10, 2));
    assert_eq!(plan_of(&db.pool, business_id).await.product_count, 10);
}

#[tokio::test]
async fn test_featured_product_needs_paid_plan() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let request = serde_json::from_value(json!({
        "name": "Torta",
        "price_cents": 5000,
        "is_featured": true,
    }))
    .unwrap();
    let result = product_service::create_product(&db.pool, &auth, business_id, request).await;

    assert!(matches!(result, Err(AppError::Forbidden)));
    assert_eq!(plan_of(&db.pool, business_id).await.product_count, 0);
}

#[tokio::test]
async fn test_duplicate_webhook_is_not_reprocessed() {
    let db = setup().await;
    let checkout = CheckoutClient::new(&db.config).unwrap();

    let event_id = Uuid::new_v4().to_string();
    let body = json!({
        "id": event_id,
        "type": "merchant_order",
        "action": "merchant_order.updated",
        "data": { "id": "mo-1" },
    })
    .to_string();
    let signature = signature_for("mo-1", "req-1");
    let inbound = || InboundWebhook {
        signature: Some(&signature),
        request_id: Some("req-1"),
        query_resource_id: None,
        body: body.as_bytes(),
    };

    let first = payment_service::handle_webhook(&db.pool, &checkout, WEBHOOK_SECRET, inbound())
        .await
        .unwrap();
    assert!(matches!(first, WebhookOutcome::Ignored { .. }));

    let (processed_at,): (Option<chrono::DateTime<chrono::Utc>>,) = sqlx::query_as(
        "SELECT processed_at FROM webhook_events WHERE provider_event_id = $1",
    )
    .bind(&event_id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert!(processed_at.is_some());

    let second = payment_service::handle_webhook(&db.pool, &checkout, WEBHOOK_SECRET, inbound())
        .await
        .unwrap();
    assert_eq!(second, WebhookOutcome::Duplicate);

    let (rows, processed_again): (i64, Option<chrono::DateTime<chrono::Utc>>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(processed_at) FROM webhook_events WHERE provider_event_id = $1",
    )
    .bind(&event_id)
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(processed_again, processed_at);
}

#[tokio::test]
async fn test_failed_webhook_is_retried_on_redelivery() {
    let db = setup().await;
    // No access token, so fetching the payment fails at the gateway
    let checkout = CheckoutClient::new(&db.config).unwrap();

    let event_id = Uuid::new_v4().to_string();
    let body = json!({
        "id": event_id,
        "type": "payment",
        "data": { "id": "9001" },
    })
    .to_string();
    let signature = signature_for("9001", "req-2");
    let inbound = || InboundWebhook {
        signature: Some(&signature),
        request_id: Some("req-2"),
        query_resource_id: None,
        body: body.as_bytes(),
    };

    for _ in 0..2 {
        let result =
            payment_service::handle_webhook(&db.pool, &checkout, WEBHOOK_SECRET, inbound()).await;
        assert!(matches!(result, Err(AppError::Gateway(_))));
    }

    let (processed_at, error): (Option<chrono::DateTime<chrono::Utc>>, Option<String>) =
        sqlx::query_as(
            "SELECT processed_at, error FROM webhook_events WHERE provider_event_id = $1",
        )
        .bind(&event_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert!(processed_at.is_none());
    assert!(error.is_some());
}

#[tokio::test]
async fn test_gateway_failure_rejects_the_payment() {
    let db = setup().await;
    let checkout = CheckoutClient::new(&db.config).unwrap();
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let err = payment_service::upgrade_plan(
        &db.pool,
        &checkout,
        "ARS",
        &auth,
        business_id,
        PlanTier::Basic,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));
    assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);

    let payments = payment_service::list_payments(&db.pool, &auth, business_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status(), PaymentStatus::Rejected);
    assert_eq!(plan_of(&db.pool, business_id).await.tier(), PlanTier::Free);
}

#[tokio::test]
async fn test_approval_activates_plan_and_same_tier_stacks() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let first = insert_pending_payment(&db.pool, business_id, PlanTier::Basic).await;
    let (payment, transition) =
        payment_service::apply_payment_status(&db.pool, first, PaymentStatus::Approved, Some("mp-1"))
            .await
            .unwrap();
    assert_eq!(transition, Transition::Apply(PaymentStatus::Approved));
    assert_eq!(payment.provider_payment_id.as_deref(), Some("mp-1"));

    let plan = plan_of(&db.pool, business_id).await;
    assert_eq!(plan.tier(), PlanTier::Basic);
    assert_eq!(plan.status, "active");
    let first_expiry = plan.expires_at.unwrap();
    assert!(first_expiry > chrono::Utc::now() + Duration::days(29));

    // Restating the status changes nothing
    let (_, transition) =
        payment_service::apply_payment_status(&db.pool, first, PaymentStatus::Approved, None)
            .await
            .unwrap();
    assert_eq!(transition, Transition::Unchanged);
    assert_eq!(plan_of(&db.pool, business_id).await.expires_at, Some(first_expiry));

    // A final payment cannot move again
    let refused =
        payment_service::apply_payment_status(&db.pool, first, PaymentStatus::Rejected, None).await;
    assert!(matches!(refused, Err(AppError::InvalidTransition { .. })));

    let second = insert_pending_payment(&db.pool, business_id, PlanTier::Basic).await;
    payment_service::apply_payment_status(&db.pool, second, PaymentStatus::Approved, None)
        .await
        .unwrap();

    let renewed = plan_of(&db.pool, business_id).await;
    assert_eq!(renewed.expires_at, Some(first_expiry + Duration::days(30)));
    assert_eq!(renewed.started_at, plan.started_at);
}

#[tokio::test]
async fn test_rejected_payment_leaves_plan_alone() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let payment = insert_pending_payment(&db.pool, business_id, PlanTier::Premium).await;
    payment_service::apply_payment_status(&db.pool, payment, PaymentStatus::Rejected, None)
        .await
        .unwrap();

    let plan = plan_of(&db.pool, business_id).await;
    assert_eq!(plan.tier(), PlanTier::Free);
    assert!(plan.expires_at.is_none());
}

#[tokio::test]
async fn test_delete_product_releases_both_counters() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;
    let product_id = create_product(&db.pool, &auth, business_id, None).await.unwrap();

    let memory = Arc::new(InMemory::new());
    let storage = storage_with(&db.config, memory.clone());
    let key = object_key(business_id, ImageKind::Product, "jpg");
    put_object(&memory, &key, 1234).await;

    let image_id = complete(
        &db.pool,
        &storage,
        &auth,
        business_id,
        ImageKind::Product,
        Some(product_id),
        &key,
    )
    .await
    .unwrap();

    // The stored size is the object's, not the 4096 the client claimed
    let size: i64 = sqlx::query_scalar("SELECT size_bytes FROM images WHERE id = $1")
        .bind(image_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(size, 1234);

    let plan = plan_of(&db.pool, business_id).await;
    assert_eq!((plan.product_count, plan.image_count), (1, 1));

    product_service::delete_product(&db.pool, &auth, product_id)
        .await
        .unwrap();

    let plan = plan_of(&db.pool, business_id).await;
    assert_eq!((plan.product_count, plan.image_count), (0, 0));
    let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(images, 0);
}

#[tokio::test]
async fn test_logo_replacement_keeps_image_count_flat() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let memory = Arc::new(InMemory::new());
    let storage = storage_with(&db.config, memory.clone());

    let first_key = object_key(business_id, ImageKind::Logo, "jpg");
    put_object(&memory, &first_key, 100).await;
    let first = complete(&db.pool, &storage, &auth, business_id, ImageKind::Logo, None, &first_key)
        .await
        .unwrap();

    let second_key = object_key(business_id, ImageKind::Logo, "jpg");
    put_object(&memory, &second_key, 200).await;
    let second = complete(&db.pool, &storage, &auth, business_id, ImageKind::Logo, None, &second_key)
        .await
        .unwrap();

    assert_eq!(plan_of(&db.pool, business_id).await.image_count, 1);

    let logo: Option<Uuid> = sqlx::query_scalar("SELECT logo_image_id FROM businesses WHERE id = $1")
        .bind(business_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(logo, Some(second));

    let old_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE id = $1")
        .bind(first)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(old_rows, 0);
}

#[tokio::test]
async fn test_upload_without_object_is_not_recorded() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let storage = storage_with(&db.config, Arc::new(InMemory::new()));
    let key = object_key(business_id, ImageKind::Cover, "jpg");

    let result = complete(&db.pool, &storage, &auth, business_id, ImageKind::Cover, None, &key).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    assert_eq!(plan_of(&db.pool, business_id).await.image_count, 0);
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE business_id = $1")
        .bind(business_id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_trial_is_single_use() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let trial = plan_service::activate_trial(&db.pool, business_id, 14)
        .await
        .unwrap();
    assert_eq!(trial.tier(), PlanTier::Premium);
    assert_eq!(trial.status, "trial");
    assert!(trial.trial_used);

    let again = plan_service::activate_trial(&db.pool, business_id, 14).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    // Still refused once the trial has lapsed back to FREE
    sqlx::query("UPDATE current_plans SET expires_at = NOW() - INTERVAL '1 day' WHERE business_id = $1")
        .bind(business_id)
        .execute(&db.pool)
        .await
        .unwrap();
    assert_eq!(plan_of(&db.pool, business_id).await.tier(), PlanTier::Free);

    let after_expiry = plan_service::activate_trial(&db.pool, business_id, 14).await;
    assert!(matches!(after_expiry, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let db = setup().await;
    let auth = register_owner(&db.pool).await;
    let business_id = create_business(&db.pool, &auth).await;

    let request = serde_json::from_value(json!({
        "name": format!("Bakery {}", Uuid::new_v4().simple()),
    }))
    .unwrap();
    let category = category_service::create_category(&db.pool, request)
        .await
        .unwrap();
    let product_id = create_product(&db.pool, &auth, business_id, Some(category.id))
        .await
        .unwrap();

    let in_use = category_service::delete_category(&db.pool, category.id).await;
    assert!(matches!(in_use, Err(AppError::Conflict(_))));

    product_service::delete_product(&db.pool, &auth, product_id)
        .await
        .unwrap();
    category_service::delete_category(&db.pool, category.id)
        .await
        .unwrap();
}
