//! Category catalog.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        business::{clean, slugify},
        category::{Category, CategoryRequest},
    },
};

pub async fn list_categories(pool: &DbPool) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(categories)
}

/// Reject references to categories that do not exist.
pub async fn ensure_exists(pool: &DbPool, category_id: Uuid) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(category_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::InvalidRequest(format!(
            "category {category_id} does not exist"
        )));
    }
    Ok(())
}

fn validated_name(request: &CategoryRequest) -> Result<String, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

pub async fn create_category(pool: &DbPool, request: CategoryRequest) -> Result<Category, AppError> {
    let name = validated_name(&request)?;

    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (slug) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(slugify(&name))
    .bind(clean(request.description))
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict(format!("A category named '{name}' already exists")))
}

/// Rename or re-describe a category. The slug follows the name.
pub async fn update_category(
    pool: &DbPool,
    category_id: Uuid,
    request: CategoryRequest,
) -> Result<Category, AppError> {
    let name = validated_name(&request)?;

    let result = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories SET name = $2, slug = $3, description = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(category_id)
    .bind(&name)
    .bind(slugify(&name))
    .bind(clean(request.description))
    .fetch_optional(pool)
    .await;

    match result {
        Ok(Some(category)) => Ok(category),
        Ok(None) => Err(AppError::NotFound("category")),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::Conflict(
            format!("A category named '{name}' already exists"),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Delete an unused category.
pub async fn delete_category(pool: &DbPool, category_id: Uuid) -> Result<(), AppError> {
    let in_use: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)
            OR EXISTS(SELECT 1 FROM businesses WHERE category_id = $1)
        "#,
    )
    .bind(category_id)
    .fetch_one(pool)
    .await?;

    if in_use {
        return Err(AppError::Conflict(
            "Category is still used by businesses or products".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("category"));
    }
    Ok(())
}
