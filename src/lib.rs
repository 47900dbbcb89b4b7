//! Local Market server: storefronts, plans, payments and uploads behind an
//! axum router. The binary in `main.rs` wires these modules together.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
