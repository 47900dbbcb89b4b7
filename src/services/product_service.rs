//! Product management with plan quota enforcement.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        business::{BusinessSummary, clean},
        image::Image,
        plan::check_product_quota,
        product::{CreateProductRequest, Product, ProductResponse, UpdateProductRequest},
    },
    services::{business_service, category_service, plan_service},
};

/// Load images for a batch of products and pair them up.
pub async fn attach_images(
    pool: &DbPool,
    products: Vec<Product>,
) -> Result<Vec<ProductResponse>, AppError> {
    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

    let images = sqlx::query_as::<_, Image>(
        "SELECT * FROM images WHERE product_id = ANY($1) ORDER BY created_at",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_product: HashMap<Uuid, Vec<Image>> = HashMap::new();
    for image in images {
        if let Some(product_id) = image.product_id {
            by_product.entry(product_id).or_default().push(image);
        }
    }

    Ok(products
        .into_iter()
        .map(|p| {
            let images = by_product.remove(&p.id).unwrap_or_default();
            ProductResponse::new(p, images)
        })
        .collect())
}

/// Products of one business; `only_active` is what storefronts show.
pub async fn list_products(
    pool: &DbPool,
    business_id: Uuid,
    only_active: bool,
) -> Result<Vec<ProductResponse>, AppError> {
    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT * FROM products
        WHERE business_id = $1 AND (NOT $2 OR is_active = true)
        ORDER BY is_featured DESC, created_at DESC
        "#,
    )
    .bind(business_id)
    .bind(only_active)
    .fetch_all(pool)
    .await?;

    attach_images(pool, products).await
}

pub async fn list_business_products(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
) -> Result<Vec<ProductResponse>, AppError> {
    business_service::load_owned(pool, auth, business_id).await?;
    list_products(pool, business_id, false).await
}

/// Create a product, enforcing the product quota under the plan lock.
///
/// # Errors
///
/// - `QuotaExceeded`: the plan's product limit is reached
/// - `Forbidden`: `is_featured` requested on the FREE plan
pub async fn create_product(
    pool: &DbPool,
    auth: &AuthContext,
    business_id: Uuid,
    request: CreateProductRequest,
) -> Result<Product, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    business_service::load_owned(pool, auth, business_id).await?;
    if let Some(category_id) = request.category_id {
        category_service::ensure_exists(pool, category_id).await?;
    }

    let mut tx = pool.begin().await?;
    let (current, limits) = plan_service::lock_current_plan(&mut tx, business_id).await?;

    if let Err(msg) = check_product_quota(&limits, &current) {
        tx.rollback().await?;
        return Err(AppError::QuotaExceeded(msg));
    }
    if request.is_featured && !current.tier().is_paid() {
        tx.rollback().await?;
        return Err(AppError::Forbidden);
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (business_id, category_id, name, description, price_cents, stock, is_featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(business_id)
    .bind(request.category_id)
    .bind(request.name.trim())
    .bind(clean(request.description))
    .bind(request.price_cents)
    .bind(request.stock)
    .bind(request.is_featured)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE current_plans SET product_count = product_count + 1, updated_at = NOW() WHERE business_id = $1",
    )
    .bind(business_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(product_id = %product.id, business_id = %business_id, "product created");
    Ok(product)
}

/// Load a product whose business the caller may manage.
pub async fn load_owned_product(
    pool: &DbPool,
    auth: &AuthContext,
    product_id: Uuid,
) -> Result<Product, AppError> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("product"))?;

    business_service::load_owned(pool, auth, product.business_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound("product"),
            other => other,
        })?;

    Ok(product)
}

pub async fn get_owned_product(
    pool: &DbPool,
    auth: &AuthContext,
    product_id: Uuid,
) -> Result<ProductResponse, AppError> {
    let product = load_owned_product(pool, auth, product_id).await?;
    let mut with_images = attach_images(pool, vec![product]).await?;
    with_images.pop().ok_or(AppError::NotFound("product"))
}

pub async fn update_product(
    pool: &DbPool,
    auth: &AuthContext,
    product_id: Uuid,
    request: UpdateProductRequest,
) -> Result<Product, AppError> {
    request.validate().map_err(AppError::InvalidRequest)?;
    let product = load_owned_product(pool, auth, product_id).await?;
    if let Some(category_id) = request.category_id {
        category_service::ensure_exists(pool, category_id).await?;
    }

    if request.is_featured == Some(true) {
        let plan = plan_service::current_plan(pool, product.business_id).await?;
        if !plan.tier().is_paid() {
            return Err(AppError::Forbidden);
        }
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            name = COALESCE(TRIM($2), name),
            description = CASE WHEN $3::TEXT IS NULL THEN description ELSE NULLIF(TRIM($3), '') END,
            price_cents = COALESCE($4, price_cents),
            category_id = COALESCE($5, category_id),
            stock = COALESCE($6, stock),
            is_featured = COALESCE($7, is_featured),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(request.name)
    .bind(request.description)
    .bind(request.price_cents)
    .bind(request.category_id)
    .bind(request.stock)
    .bind(request.is_featured)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

pub async fn set_product_active(
    pool: &DbPool,
    auth: &AuthContext,
    product_id: Uuid,
    is_active: bool,
) -> Result<Product, AppError> {
    load_owned_product(pool, auth, product_id).await?;

    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(product_id)
    .bind(is_active)
    .fetch_one(pool)
    .await?;

    Ok(product)
}

/// Hard delete. Images go with the product (FK cascade) and both usage
/// counters are decremented in the same transaction.
pub async fn delete_product(
    pool: &DbPool,
    auth: &AuthContext,
    product_id: Uuid,
) -> Result<(), AppError> {
    let product = load_owned_product(pool, auth, product_id).await?;

    let mut tx = pool.begin().await?;
    plan_service::lock_current_plan(&mut tx, product.business_id).await?;

    let image_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound("product"));
    }

    sqlx::query(
        r#"
        UPDATE current_plans
        SET product_count = GREATEST(product_count - 1, 0),
            image_count = GREATEST(image_count - $2::INTEGER, 0),
            updated_at = NOW()
        WHERE business_id = $1
        "#,
    )
    .bind(product.business_id)
    .bind(image_count as i32)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(product_id = %product_id, images = image_count, "product deleted");
    Ok(())
}

pub async fn business_summary(pool: &DbPool, business_id: Uuid) -> Result<BusinessSummary, AppError> {
    sqlx::query_as::<_, BusinessSummary>(
        r#"
        SELECT b.id, b.name, b.slug, b.city, b.is_verified, li.url AS logo_url
        FROM businesses b
        LEFT JOIN images li ON li.id = b.logo_image_id
        WHERE b.id = $1
        "#,
    )
    .bind(business_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("business"))
}

/// Public product page: active product of an active, published business.
pub async fn get_public_product(pool: &DbPool, product_id: Uuid) -> Result<ProductResponse, AppError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.* FROM products p
        JOIN businesses b ON b.id = p.business_id
        WHERE p.id = $1
          AND p.is_active = true
          AND b.is_active = true
          AND b.is_published = true
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("product"))?;

    let business = business_summary(pool, product.business_id).await?;
    let response = attach_images(pool, vec![product])
        .await?
        .pop()
        .ok_or(AppError::NotFound("product"))?;

    Ok(response.with_business(business))
}
