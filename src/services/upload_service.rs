//! Direct-to-storage uploads and image metadata.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        image::{
            CompleteUploadRequest, Image, ImageKind, MAX_UPLOAD_BYTES, PresignUploadRequest,
            PresignUploadResponse, business_prefix, object_key, validate_upload,
        },
        plan::check_image_quota,
    },
    services::{business_service, plan_service, product_service, storage::ObjectStorage},
};

/// Product images must belong to a product of the same business.
async fn ensure_product_in_business(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    product_id: Option<Uuid>,
) -> Result<(), AppError> {
    if let Some(product_id) = product_id {
        let product = product_service::load_owned_product(pool, auth, product_id).await?;
        if product.business_id != business_id {
            return Err(AppError::NotFound("product"));
        }
    }
    Ok(())
}

async fn images_on_product<'e, E: sqlx::postgres::PgExecutor<'e>>(
    executor: E,
    product_id: Uuid,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Hand out a presigned `PUT` URL for one image.
///
/// The quota is checked here so clients fail before uploading, and again in
/// [`complete_upload`] where it is authoritative.
pub async fn presign_upload(
    pool: &DbPool,
    storage: &ObjectStorage,
    auth: &AuthContext,
    business_id: Uuid,
    request: PresignUploadRequest,
) -> Result<PresignUploadResponse, AppError> {
    let extension = validate_upload(
        request.kind,
        request.product_id,
        &request.content_type,
        request.size_bytes,
    )
    .map_err(AppError::InvalidRequest)?;

    business_service::load_owned(pool, auth, business_id).await?;
    ensure_product_in_business(pool, auth, business_id, request.product_id).await?;

    if let Some(product_id) = request.product_id {
        let usage = plan_service::plan_usage(pool, business_id).await?;
        let count = images_on_product(pool, product_id).await?;
        check_image_quota(&usage.limits, count).map_err(AppError::QuotaExceeded)?;
    }

    let key = object_key(business_id, request.kind, extension);
    let upload_url = storage.presign_put(&key).await?;

    tracing::debug!(business_id = %business_id, key = %key, file = %request.file_name, "upload presigned");

    Ok(PresignUploadResponse {
        public_url: storage.public_url(&key),
        upload_url,
        object_key: key,
        expires_in: storage.ttl_secs,
    })
}

/// Size of the object the client reports as uploaded, read from the store.
///
/// An oversized object is removed before the request is refused.
async fn confirm_uploaded(storage: &ObjectStorage, key: &str) -> Result<i64, AppError> {
    let object = storage.head(key).await?.ok_or_else(|| {
        AppError::InvalidRequest(format!("nothing has been uploaded to '{key}'"))
    })?;

    if object.size_bytes <= 0 {
        return Err(AppError::InvalidRequest("uploaded file is empty".to_string()));
    }
    if object.size_bytes > MAX_UPLOAD_BYTES {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "failed to remove oversized upload");
        }
        return Err(AppError::InvalidRequest(format!(
            "uploaded file exceeds {MAX_UPLOAD_BYTES} bytes"
        )));
    }
    Ok(object.size_bytes)
}

/// Record an uploaded image.
///
/// The stored object's real size is recorded, not the size the client
/// claimed. Logos and covers replace the previous image of that kind.
pub async fn complete_upload(
    pool: &DbPool,
    storage: &ObjectStorage,
    auth: &AuthContext,
    business_id: Uuid,
    request: CompleteUploadRequest,
) -> Result<Image, AppError> {
    validate_upload(
        request.kind,
        request.product_id,
        &request.content_type,
        request.size_bytes,
    )
    .map_err(AppError::InvalidRequest)?;

    let expected_prefix = format!("{}{}/", business_prefix(business_id), request.kind);
    if !request.object_key.starts_with(&expected_prefix) || request.object_key.contains("..") {
        return Err(AppError::InvalidRequest(
            "object_key does not belong to this business".to_string(),
        ));
    }

    business_service::load_owned(pool, auth, business_id).await?;
    ensure_product_in_business(pool, auth, business_id, request.product_id).await?;

    let size_bytes = confirm_uploaded(storage, &request.object_key).await?;

    let mut tx = pool.begin().await?;
    let (_, limits) = plan_service::lock_current_plan(&mut tx, business_id).await?;

    if let Some(product_id) = request.product_id {
        let count = images_on_product(&mut *tx, product_id).await?;
        if let Err(msg) = check_image_quota(&limits, count) {
            tx.rollback().await?;
            return Err(AppError::QuotaExceeded(msg));
        }
    }

    let image = sqlx::query_as::<_, Image>(
        r#"
        INSERT INTO images (business_id, product_id, kind, object_key, url, content_type, size_bytes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (object_key) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(request.product_id)
    .bind(request.kind.as_str())
    .bind(&request.object_key)
    .bind(storage.public_url(&request.object_key))
    .bind(request.content_type.to_ascii_lowercase())
    .bind(size_bytes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("This upload was already recorded".to_string()))?;

    let mut added = 1;

    let column = match request.kind {
        ImageKind::Logo => Some("logo_image_id"),
        ImageKind::Cover => Some("cover_image_id"),
        ImageKind::Product => None,
    };
    if let Some(column) = column {
        // The column name comes from the match above, never from input
        let previous: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT {column} FROM businesses WHERE id = $1 FOR UPDATE"
        ))
        .bind(business_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "UPDATE businesses SET {column} = $2, updated_at = NOW() WHERE id = $1"
        ))
        .bind(business_id)
        .bind(image.id)
        .execute(&mut *tx)
        .await?;

        if let Some(previous) = previous {
            let removed = sqlx::query("DELETE FROM images WHERE id = $1")
                .bind(previous)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            added -= removed as i32;
        }
    }

    sqlx::query(
        "UPDATE current_plans SET image_count = GREATEST(image_count + $2, 0), updated_at = NOW() WHERE business_id = $1",
    )
    .bind(business_id)
    .bind(added)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(image_id = %image.id, business_id = %business_id, kind = %request.kind, "image recorded");
    Ok(image)
}

/// Remove an image record. The stored object is left to a bucket lifecycle
/// rule.
pub async fn delete_image(pool: &DbPool, auth: &AuthContext, image_id: Uuid) -> Result<(), AppError> {
    let image = sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = $1")
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("image"))?;

    business_service::load_owned(pool, auth, image.business_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound("image"),
            other => other,
        })?;

    let mut tx = pool.begin().await?;
    plan_service::lock_current_plan(&mut tx, image.business_id).await?;

    // businesses.logo_image_id / cover_image_id are cleared by ON DELETE SET NULL
    let deleted = sqlx::query("DELETE FROM images WHERE id = $1")
        .bind(image_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted > 0 {
        sqlx::query(
            "UPDATE current_plans SET image_count = GREATEST(image_count - 1, 0), updated_at = NOW() WHERE business_id = $1",
        )
        .bind(image.business_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
