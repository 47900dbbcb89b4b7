//! Product data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{business::BusinessSummary, image::Image};

/// Represents a product record from the database.
///
/// Prices are stored as `i64` cents, never floats.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,

    /// Price in cents; must be >= 0 (CHECK constraint)
    pub price_cents: i64,

    /// Units in stock; `None` means the business does not track stock
    pub stock: Option<i32>,

    /// Featured products sort first in search. Paid plans only.
    pub is_featured: bool,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a product.
///
/// ```json
/// {
///   "name": "Sourdough loaf",
///   "price_cents": 350000,
///   "category_id": "550e8400-e29b-41d4-a716-446655440000",
///   "stock": 20
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
    #[serde(default)]
    pub is_featured: bool,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        validate_price_and_stock(Some(self.price_cents), self.stock)
    }
}

/// Partial product update.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<Uuid>,
    pub stock: Option<i32>,
    pub is_featured: Option<bool>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
        }
        validate_price_and_stock(self.price_cents, self.stock)
    }
}

fn validate_price_and_stock(price_cents: Option<i64>, stock: Option<i32>) -> Result<(), String> {
    if price_cents.is_some_and(|p| p < 0) {
        return Err("price_cents must not be negative".to_string());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("stock must not be negative".to_string());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Product with its images, and the owning business on public routes.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<BusinessSummary>,
}

impl ProductResponse {
    pub fn new(product: Product, images: Vec<Image>) -> Self {
        Self {
            product,
            images,
            business: None,
        }
    }

    pub fn with_business(mut self, business: BusinessSummary) -> Self {
        self.business = Some(business);
        self
    }
}

/// Search result row for the explore endpoint.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProductListing {
    pub id: Uuid,
    pub business_id: Uuid,
    pub business_name: String,
    pub business_slug: String,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub is_featured: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
