//! Local Market - Main Application Entry Point
//!
//! REST API for a local business marketplace. Owners publish a storefront
//! with products and images, pay for higher plan tiers through a hosted
//! checkout, and read visit analytics. Visitors browse and search published
//! storefronts without an account.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing
//! - **Payments**: hosted checkout plus signed webhook notifications
//! - **Uploads**: presigned S3-compatible `PUT` URLs
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Create the bootstrap admin, if configured
//! 5. Start the plan expiry sweeper
//! 6. Build HTTP router and start serving

use std::time::Duration;

use local_market_server::{app, config, db, services, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    if let Some(key) = config.bootstrap_admin_key.as_deref() {
        services::user_service::ensure_bootstrap_admin(&pool, key).await?;
    }

    let sweep_every = Duration::from_secs(config.plan_sweep_interval_secs.max(1));
    let _sweeper = services::plan_service::spawn_expiry_sweeper(pool.clone(), sweep_every);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = state::AppState::new(pool, config)?;
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
