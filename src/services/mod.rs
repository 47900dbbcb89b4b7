//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and calls to external
//! providers.

pub mod admin_service;
pub mod analytics_service;
pub mod business_service;
pub mod category_service;
pub mod checkout_client;
pub mod explore_service;
pub mod payment_service;
pub mod plan_service;
pub mod product_service;
pub mod storage;
pub mod upload_service;
pub mod user_service;
