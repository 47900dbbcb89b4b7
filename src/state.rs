//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    db::DbPool,
    services::{checkout_client::CheckoutClient, storage::ObjectStorage},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub checkout: CheckoutClient,
    pub storage: Arc<ObjectStorage>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, crate::error::AppError> {
        let checkout = CheckoutClient::new(&config)?;
        let storage = ObjectStorage::from_config(&config)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            checkout,
            storage: Arc::new(storage),
        })
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
