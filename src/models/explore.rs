//! Public search queries and paged responses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 50;

/// `?page=&per_page=` with 1-based pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Result<Self, String> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page < 1 {
            return Err("page must be >= 1".to_string());
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(format!("per_page must be between 1 and {MAX_PER_PAGE}"));
        }
        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct BusinessSearchQuery {
    pub q: Option<String>,
    pub category: Option<Uuid>,
    pub city: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductSearchQuery {
    pub q: Option<String>,
    pub category: Option<Uuid>,
    pub business: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ProductSearchQuery {
    pub fn validate_prices(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err("min_price must not exceed max_price".to_string());
            }
        }
        if self.min_price.is_some_and(|p| p < 0) || self.max_price.is_some_and(|p| p < 0) {
            return Err("prices must not be negative".to_string());
        }
        Ok(())
    }
}

/// Escape `\`, `%` and `_` so the text matches literally under ILIKE.
pub fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Turn free text into a substring ILIKE pattern.
pub fn like_pattern(q: &str) -> Option<String> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    Some(format!("%{}%", escape_like(q)))
}

/// Whole-value, case-insensitive ILIKE pattern for a city name.
pub fn city_pattern(city: &str) -> Option<String> {
    let city = city.trim();
    if city.is_empty() {
        return None;
    }
    Some(escape_like(city))
}
