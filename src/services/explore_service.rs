//! Public search over published storefronts and their products.
//!
//! Filters are optional, so queries are assembled with `QueryBuilder` and
//! every value is bound, never interpolated.

use sqlx::{Postgres, QueryBuilder};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        business::BusinessListing,
        explore::{
            BusinessSearchQuery, Page, Pagination, ProductSearchQuery, city_pattern, like_pattern,
        },
        product::ProductListing,
    },
};

fn push_business_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &BusinessSearchQuery) {
    builder.push(" WHERE b.is_active = true AND b.is_published = true");

    if let Some(pattern) = query.q.as_deref().and_then(like_pattern) {
        builder
            .push(" AND (b.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = query.category {
        builder.push(" AND b.category_id = ").push_bind(category);
    }
    if let Some(city) = query.city.as_deref().and_then(city_pattern) {
        builder.push(" AND b.city ILIKE ").push_bind(city);
    }
}

/// Featured (paid plan) businesses first, then newest.
pub async fn search_businesses(
    pool: &DbPool,
    query: BusinessSearchQuery,
) -> Result<Page<BusinessListing>, AppError> {
    let paging = Pagination::new(query.page, query.per_page).map_err(AppError::InvalidRequest)?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM businesses b");
    push_business_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(
        r#"
        SELECT b.id, b.name, b.slug, b.description, b.city, b.category_id, b.is_verified,
               li.url AS logo_url,
               ci.url AS cover_url,
               (cp.tier <> 'free' AND (cp.expires_at IS NULL OR cp.expires_at > NOW())) AS is_featured,
               b.created_at
        FROM businesses b
        JOIN current_plans cp ON cp.business_id = b.id
        LEFT JOIN images li ON li.id = b.logo_image_id
        LEFT JOIN images ci ON ci.id = b.cover_image_id
        "#,
    );
    push_business_filters(&mut select, &query);
    select
        .push(" ORDER BY is_featured DESC, b.created_at DESC LIMIT ")
        .push_bind(paging.per_page)
        .push(" OFFSET ")
        .push_bind(paging.offset());

    let items = select
        .build_query_as::<BusinessListing>()
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items,
        page: paging.page,
        per_page: paging.per_page,
        total,
    })
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductSearchQuery) {
    builder.push(
        " WHERE p.is_active = true AND b.is_active = true AND b.is_published = true",
    );

    if let Some(pattern) = query.q.as_deref().and_then(like_pattern) {
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = query.category {
        builder.push(" AND p.category_id = ").push_bind(category);
    }
    if let Some(business) = query.business {
        builder.push(" AND p.business_id = ").push_bind(business);
    }
    if let Some(min) = query.min_price {
        builder.push(" AND p.price_cents >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND p.price_cents <= ").push_bind(max);
    }
}

/// Featured products first, then newest.
pub async fn search_products(
    pool: &DbPool,
    query: ProductSearchQuery,
) -> Result<Page<ProductListing>, AppError> {
    query.validate_prices().map_err(AppError::InvalidRequest)?;
    let paging = Pagination::new(query.page, query.per_page).map_err(AppError::InvalidRequest)?;

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM products p JOIN businesses b ON b.id = p.business_id",
    );
    push_product_filters(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(
        r#"
        SELECT p.id, p.business_id, b.name AS business_name, b.slug AS business_slug,
               p.category_id, p.name, p.description, p.price_cents, p.is_featured,
               (SELECT i.url FROM images i WHERE i.product_id = p.id ORDER BY i.created_at LIMIT 1) AS image_url,
               p.created_at
        FROM products p
        JOIN businesses b ON b.id = p.business_id
        "#,
    );
    push_product_filters(&mut select, &query);
    select
        .push(" ORDER BY p.is_featured DESC, p.created_at DESC LIMIT ")
        .push_bind(paging.per_page)
        .push(" OFFSET ")
        .push_bind(paging.offset());

    let items = select
        .build_query_as::<ProductListing>()
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items,
        page: paging.page,
        per_page: paging.per_page,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn business_filters_bind_every_value() {
        let query = BusinessSearchQuery {
            q: Some("pan'; DROP TABLE businesses; --".into()),
            category: Some(Uuid::nil()),
            city: Some(" Rosario ".into()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM businesses b");
        push_business_filters(&mut builder, &query);
        let sql = builder.sql();

        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("b.name ILIKE $1"));
        assert!(sql.contains("b.description ILIKE $2"));
        assert!(sql.contains("b.category_id = $3"));
        assert!(sql.contains("b.city ILIKE $4"));
    }

    #[test]
    fn blank_city_adds_no_filter() {
        let query = BusinessSearchQuery {
            city: Some("   ".into()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM businesses b");
        push_business_filters(&mut builder, &query);
        assert!(!builder.sql().contains("b.city"));
    }

    #[test]
    fn product_filters_skip_absent_values() {
        let query = ProductSearchQuery {
            min_price: Some(100),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM products p");
        push_product_filters(&mut builder, &query);
        let sql = builder.sql();

        assert!(sql.contains("p.price_cents >= $1"));
        assert!(!sql.contains("ILIKE"));
        assert!(!sql.contains("p.price_cents <="));
    }
}
