//! HTTP request handlers (route handlers).
//!
//! Handlers only extract request data, call into `services` and shape the
//! response. Ownership and quota checks live in the services.

pub mod admin;
pub mod analytics;
pub mod businesses;
pub mod categories;
pub mod explore;
pub mod health;
pub mod payments;
pub mod plans;
pub mod products;
pub mod uploads;
pub mod users;
