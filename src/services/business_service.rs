//! Business (storefront) lifecycle.
//!
//! Every owner-facing operation goes through [`load_owned`], which returns
//! 404 for businesses the caller does not own so that other tenants'
//! storefront ids cannot be discovered. Admins bypass ownership.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        business::{
            Business, BusinessResponse, BusinessSettingsRequest, CreateBusinessRequest,
            StorefrontResponse, UpdateBusinessRequest, clean, slugify,
        },
        image::Image,
    },
    services::{category_service, plan_service, product_service},
};

const SLUG_ATTEMPTS: usize = 3;

/// Pick the first free slug among `base`, `base-2`, `base-3`, ...
pub fn unique_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4().simple()))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Create a business and its FREE plan in one transaction.
///
/// The slug is derived from the name; collisions get a numeric suffix.
pub async fn create_business(
    pool: &DbPool,
    owner_id: Uuid,
    request: CreateBusinessRequest,
) -> Result<BusinessResponse, AppError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }
    if let Some(category_id) = request.category_id {
        category_service::ensure_exists(pool, category_id).await?;
    }

    let base = slugify(&name);

    for attempt in 1..=SLUG_ATTEMPTS {
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM businesses WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(&base)
        .fetch_all(pool)
        .await?;
        let slug = unique_slug(&base, &taken);

        let mut tx = pool.begin().await?;

        let inserted = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                owner_id, category_id, name, slug, description, city,
                address, phone, whatsapp, email, website
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(request.category_id)
        .bind(&name)
        .bind(&slug)
        .bind(clean(request.description.clone()))
        .bind(clean(request.city.clone()))
        .bind(clean(request.address.clone()))
        .bind(clean(request.phone.clone()))
        .bind(clean(request.whatsapp.clone()))
        .bind(clean(request.email.clone()))
        .bind(clean(request.website.clone()))
        .fetch_one(&mut *tx)
        .await;

        let business = match inserted {
            Ok(business) => business,
            Err(e) if is_unique_violation(&e) && attempt < SLUG_ATTEMPTS => {
                tracing::debug!(slug = %slug, "slug taken concurrently, retrying");
                tx.rollback().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let plan = plan_service::create_free_plan(&mut tx, business.id).await?;

        tx.commit().await?;

        tracing::info!(business_id = %business.id, slug = %business.slug, "business created");

        return Ok(BusinessResponse { business, plan });
    }

    Err(AppError::Conflict("Could not allocate a unique slug".to_string()))
}

/// Load a business the caller may manage.
///
/// Soft-deleted businesses are invisible to owners but not to admins.
pub async fn load_owned(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
) -> Result<Business, AppError> {
    let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
        .bind(business_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("business"))?;

    if auth.is_admin() {
        return Ok(business);
    }
    if business.owner_id != auth.user_id || !business.is_active {
        return Err(AppError::NotFound("business"));
    }
    Ok(business)
}

pub async fn get_my_business(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
) -> Result<BusinessResponse, AppError> {
    let business = load_owned(pool, auth, business_id).await?;
    let plan = plan_service::current_plan(pool, business.id).await?;
    Ok(BusinessResponse { business, plan })
}

pub async fn list_my_businesses(pool: &DbPool, owner_id: Uuid) -> Result<Vec<Business>, AppError> {
    let businesses = sqlx::query_as::<_, Business>(
        "SELECT * FROM businesses WHERE owner_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(businesses)
}

/// Partial update. Blank optional fields are cleared; the slug is kept.
pub async fn update_business(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    request: UpdateBusinessRequest,
) -> Result<Business, AppError> {
    load_owned(pool, auth, business_id).await?;

    let name = match request.name {
        Some(n) if n.trim().is_empty() => {
            return Err(AppError::InvalidRequest("name must not be empty".to_string()));
        }
        other => other.map(|n| n.trim().to_string()),
    };
    if let Some(category_id) = request.category_id {
        category_service::ensure_exists(pool, category_id).await?;
    }

    let business = sqlx::query_as::<_, Business>(
        r#"
        UPDATE businesses SET
            name = COALESCE($2, name),
            category_id = COALESCE($3, category_id),
            description = CASE WHEN $4::TEXT IS NULL THEN description ELSE NULLIF(TRIM($4), '') END,
            city = CASE WHEN $5::TEXT IS NULL THEN city ELSE NULLIF(TRIM($5), '') END,
            address = CASE WHEN $6::TEXT IS NULL THEN address ELSE NULLIF(TRIM($6), '') END,
            phone = CASE WHEN $7::TEXT IS NULL THEN phone ELSE NULLIF(TRIM($7), '') END,
            whatsapp = CASE WHEN $8::TEXT IS NULL THEN whatsapp ELSE NULLIF(TRIM($8), '') END,
            email = CASE WHEN $9::TEXT IS NULL THEN email ELSE NULLIF(TRIM($9), '') END,
            website = CASE WHEN $10::TEXT IS NULL THEN website ELSE NULLIF(TRIM($10), '') END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(name)
    .bind(request.category_id)
    .bind(request.description)
    .bind(request.city)
    .bind(request.address)
    .bind(request.phone)
    .bind(request.whatsapp)
    .bind(request.email)
    .bind(request.website)
    .fetch_one(pool)
    .await?;

    Ok(business)
}

pub async fn update_settings(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    request: BusinessSettingsRequest,
) -> Result<Business, AppError> {
    load_owned(pool, auth, business_id).await?;

    for (field, value) in [
        ("opening_hours", &request.opening_hours),
        ("social_links", &request.social_links),
    ] {
        if value.as_ref().is_some_and(|v| !v.is_object()) {
            return Err(AppError::InvalidRequest(format!("{field} must be a JSON object")));
        }
    }

    let business = sqlx::query_as::<_, Business>(
        r#"
        UPDATE businesses SET
            is_published = COALESCE($2, is_published),
            opening_hours = COALESCE($3, opening_hours),
            social_links = COALESCE($4, social_links),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(request.is_published)
    .bind(request.opening_hours)
    .bind(request.social_links)
    .fetch_one(pool)
    .await?;

    Ok(business)
}

/// Soft delete. Products stay in the database but every public query
/// requires an active business, so they disappear with it.
pub async fn delete_business(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
) -> Result<(), AppError> {
    load_owned(pool, auth, business_id).await?;

    sqlx::query(
        "UPDATE businesses SET is_active = false, is_published = false, updated_at = NOW() WHERE id = $1",
    )
    .bind(business_id)
    .execute(pool)
    .await?;

    tracing::info!(business_id = %business_id, "business deleted");
    Ok(())
}

/// Fetch a business visible to the public (active and published).
pub async fn load_public(pool: &DbPool, business_id: Uuid) -> Result<Business, AppError> {
    sqlx::query_as::<_, Business>(
        "SELECT * FROM businesses WHERE id = $1 AND is_active = true AND is_published = true",
    )
    .bind(business_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("business"))
}

/// Public storefront page by slug.
pub async fn get_storefront(pool: &DbPool, slug: &str) -> Result<StorefrontResponse, AppError> {
    let business = sqlx::query_as::<_, Business>(
        "SELECT * FROM businesses WHERE slug = $1 AND is_active = true AND is_published = true",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("business"))?;

    let mut branding = sqlx::query_as::<_, Image>(
        "SELECT * FROM images WHERE id = ANY($1)",
    )
    .bind(
        [business.logo_image_id, business.cover_image_id]
            .into_iter()
            .flatten()
            .collect::<Vec<Uuid>>(),
    )
    .fetch_all(pool)
    .await?;

    let logo = take_image(&mut branding, business.logo_image_id);
    let cover = take_image(&mut branding, business.cover_image_id);

    let products = product_service::list_products(pool, business.id, true).await?;

    Ok(StorefrontResponse {
        business,
        logo,
        cover,
        products,
    })
}

fn take_image(images: &mut Vec<Image>, id: Option<Uuid>) -> Option<Image> {
    let id = id?;
    let index = images.iter().position(|img| img.id == id)?;
    Some(images.swap_remove(index))
}

/// Admin listing, newest first. `include_inactive` also returns soft-deleted
/// businesses.
pub async fn list_all(pool: &DbPool, include_inactive: bool) -> Result<Vec<Business>, AppError> {
    let businesses = sqlx::query_as::<_, Business>(
        "SELECT * FROM businesses WHERE ($1 OR is_active = true) ORDER BY created_at DESC",
    )
    .bind(include_inactive)
    .fetch_all(pool)
    .await?;

    Ok(businesses)
}

/// Admin moderation: (re)activate or suspend a business.
pub async fn set_active(pool: &DbPool, business_id: Uuid, active: bool) -> Result<Business, AppError> {
    let business = sqlx::query_as::<_, Business>(
        "UPDATE businesses SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(business_id)
    .bind(active)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("business"))?;

    tracing::info!(business_id = %business_id, active, "business moderation");
    Ok(business)
}

pub async fn set_verified(
    pool: &DbPool,
    business_id: Uuid,
    verified: bool,
) -> Result<Business, AppError> {
    sqlx::query_as::<_, Business>(
        "UPDATE businesses SET is_verified = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(business_id)
    .bind(verified)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("business"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_slug_keeps_free_base() {
        assert_eq!(unique_slug("bakery", &[]), "bakery");
        assert_eq!(unique_slug("bakery", &["bakery-2".into()]), "bakery");
    }

    #[test]
    fn unique_slug_appends_first_free_suffix() {
        let taken = vec!["bakery".to_string(), "bakery-2".to_string(), "bakery-4".to_string()];
        assert_eq!(unique_slug("bakery", &taken), "bakery-3");
    }
}
