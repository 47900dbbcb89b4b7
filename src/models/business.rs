//! Business (storefront) models and API request/response types.
//!
//! A business is a merchant tenant. It belongs to one owner, has exactly one
//! `current_plans` row, and owns its products and images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{image::Image, plan::CurrentPlan, product::ProductResponse};

/// Represents a business record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Business {
    pub id: Uuid,

    /// User that owns this storefront. Every owner query filters on it.
    pub owner_id: Uuid,

    pub category_id: Option<Uuid>,
    pub name: String,

    /// URL-safe unique identifier used by public storefront routes
    pub slug: String,

    pub description: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<serde_json::Value>,
    pub social_links: Option<serde_json::Value>,
    pub logo_image_id: Option<Uuid>,
    pub cover_image_id: Option<Uuid>,

    /// Hidden from the public until the owner publishes it
    pub is_published: bool,

    /// Set by admins after review
    pub is_verified: bool,

    /// Soft-delete / moderation flag
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a business.
///
/// ```json
/// {
///   "name": "La Esquina Bakery",
///   "description": "Fresh bread every morning",
///   "category_id": "550e8400-e29b-41d4-a716-446655440000",
///   "city": "Córdoba"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// Partial update. Absent fields are left unchanged; the slug never changes.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBusinessRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// Storefront settings.
#[derive(Debug, Deserialize)]
pub struct BusinessSettingsRequest {
    pub is_published: Option<bool>,
    pub opening_hours: Option<serde_json::Value>,
    pub social_links: Option<serde_json::Value>,
}

/// Business returned to owners and admins, with its plan attached.
#[derive(Debug, Serialize)]
pub struct BusinessResponse {
    #[serde(flatten)]
    pub business: Business,
    pub plan: CurrentPlan,
}

/// Compact business representation embedded in public product/search results.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BusinessSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub city: Option<String>,
    pub is_verified: bool,
    pub logo_url: Option<String>,
}

/// Search result row for the explore endpoint.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BusinessListing {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_verified: bool,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,

    /// True when the business is on a paid or trial plan
    pub is_featured: bool,

    pub created_at: DateTime<Utc>,
}

/// Public storefront page: business, its images and active products.
#[derive(Debug, Serialize)]
pub struct StorefrontResponse {
    pub business: Business,
    pub logo: Option<Image>,
    pub cover: Option<Image>,
    pub products: Vec<ProductResponse>,
}

/// Trim an optional text field, mapping blank strings to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Derive a URL slug from a display name.
///
/// Lowercases ASCII alphanumerics, folds common Latin accents, and collapses
/// every other run of characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let mapped = match ch {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            c => c,
        };

        if mapped.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(mapped);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("business");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("La Esquina  Bakery!"), "la-esquina-bakery");
        assert_eq!(slugify("  --Hello--World--  "), "hello-world");
    }

    #[test]
    fn slugify_folds_accents() {
        assert_eq!(slugify("Panadería Ñandú"), "panaderia-nandu");
        assert_eq!(slugify("Café & Crème"), "cafe-creme");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify("!!!"), "business");
        assert_eq!(slugify(""), "business");
    }

    #[test]
    fn clean_drops_blank_values() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" x ".into())), Some("x".into()));
        assert_eq!(clean(None), None);
    }
}
