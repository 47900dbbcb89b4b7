//! HTTP middleware components.

/// API key authentication and the admin gate
pub mod auth;
