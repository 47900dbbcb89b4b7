//! Application configuration management.
//!
//! Configuration is read from environment variables with `envy`, after an
//! optional `.env` file has been loaded by `dotenvy`.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `CHECKOUT_*`: hosted checkout provider credentials
/// - `STORAGE_*`: S3-compatible blob storage used for presigned uploads
/// - `BOOTSTRAP_ADMIN_KEY` (optional): API key of an admin created on startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Base URL the checkout provider redirects buyers back to.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_checkout_api_base")]
    pub checkout_api_base: String,

    #[serde(default)]
    pub checkout_access_token: String,

    /// Secret used to verify `x-signature` on inbound payment notifications.
    ///
    /// When empty every notification is rejected.
    #[serde(default)]
    pub checkout_webhook_secret: String,

    #[serde(default = "default_currency")]
    pub checkout_currency: String,

    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,

    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    #[serde(default = "default_storage_region")]
    pub storage_region: String,

    #[serde(default)]
    pub storage_access_key: String,

    #[serde(default)]
    pub storage_secret_key: String,

    /// Address objects as `<endpoint>/<bucket>/<key>` instead of
    /// `<bucket>.<endpoint host>/<key>`.
    #[serde(default = "default_true")]
    pub storage_path_style: bool,

    #[serde(default)]
    pub storage_public_base_url: Option<String>,

    #[serde(default = "default_upload_ttl")]
    pub upload_url_ttl_secs: u64,

    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    #[serde(default = "default_sweep_interval")]
    pub plan_sweep_interval_secs: u64,

    #[serde(default)]
    pub bootstrap_admin_key: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_checkout_api_base() -> String {
    "https://api.mercadopago.com".to_string()
}

fn default_currency() -> String {
    "ARS".to_string()
}

fn default_storage_endpoint() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_storage_bucket() -> String {
    "local-market".to_string()
}

fn default_storage_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_upload_ttl() -> u64 {
    900
}

fn default_trial_days() -> i64 {
    14
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a value cannot be
    /// parsed into its expected type.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Build a config from explicit key/value pairs instead of the process
    /// environment.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, envy::Error> {
        envy::from_iter(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }
}
