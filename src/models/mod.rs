//! Data models representing database entities and API payloads.

pub mod analytics;
/// API key authentication model
pub mod api_key;
pub mod business;
pub mod category;
pub mod explore;
pub mod image;
pub mod payment;
pub mod plan;
pub mod product;
pub mod user;
/// Inbound payment provider notifications
pub mod webhook;
