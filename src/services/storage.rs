//! S3-compatible object storage.
//!
//! Clients `PUT` straight into the bucket with a presigned URL. The server
//! only signs URLs and, when an upload is reported, checks the object with a
//! `HEAD` request.

use std::{sync::Arc, time::Duration};

use object_store::{
    ObjectStore,
    aws::AmazonS3Builder,
    path::Path,
    signer::Signer,
};
use reqwest::Method;

use crate::{config::Config, error::AppError};

/// Longest expiry S3 accepts for a presigned URL.
const MAX_PRESIGN_SECS: u64 = 604_800;

/// Size of an object as the store reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredObject {
    pub size_bytes: i64,
}

/// One bucket, reachable for signing and metadata lookups.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    objects: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
    has_credentials: bool,
    public_base_url: String,
    pub ttl_secs: u64,
}

impl ObjectStorage {
    /// Build the S3 client from `STORAGE_*` settings. Nothing is sent over
    /// the network here.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let endpoint = url::Url::parse(&config.storage_endpoint)
            .map_err(|e| AppError::Storage(format!("invalid STORAGE_ENDPOINT: {e}")))?;
        let host = endpoint
            .host_str()
            .ok_or_else(|| AppError::Storage("STORAGE_ENDPOINT has no host".to_string()))?;
        let authority = match endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let bucket = &config.storage_bucket;
        // Virtual-hosted requests expect the bucket already in the endpoint
        let (client_endpoint, bucket_base_url) = if config.storage_path_style {
            let base = format!("{}://{authority}", endpoint.scheme());
            (base.clone(), format!("{base}/{bucket}"))
        } else {
            let base = format!("{}://{bucket}.{authority}", endpoint.scheme());
            (base.clone(), base)
        };

        let has_credentials =
            !config.storage_access_key.is_empty() && !config.storage_secret_key.is_empty();

        let mut builder = AmazonS3Builder::new()
            .with_endpoint(client_endpoint)
            .with_bucket_name(bucket)
            .with_region(&config.storage_region)
            .with_virtual_hosted_style_request(!config.storage_path_style)
            .with_allow_http(endpoint.scheme() == "http");
        if has_credentials {
            builder = builder
                .with_access_key_id(&config.storage_access_key)
                .with_secret_access_key(&config.storage_secret_key);
        }
        let s3 = Arc::new(builder.build().map_err(storage_error)?);

        let public_base_url = match &config.storage_public_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => bucket_base_url,
        };

        Ok(Self {
            objects: s3.clone(),
            signer: s3,
            has_credentials,
            public_base_url,
            ttl_secs: config.upload_url_ttl_secs,
        })
    }

    /// Swap the store used for lookups and deletes, keeping the signer.
    pub fn with_objects(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = objects;
        self
    }

    /// URL the object is readable at once uploaded.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    /// Presigned `PUT` URL valid for the configured TTL.
    pub async fn presign_put(&self, key: &str) -> Result<String, AppError> {
        if !self.has_credentials {
            return Err(AppError::Storage(
                "storage credentials are not configured".to_string(),
            ));
        }
        if !(1..=MAX_PRESIGN_SECS).contains(&self.ttl_secs) {
            return Err(AppError::Storage("presign expiry must be 1s..7d".to_string()));
        }

        let url = self
            .signer
            .signed_url(
                Method::PUT,
                &Path::from(key),
                Duration::from_secs(self.ttl_secs),
            )
            .await
            .map_err(storage_error)?;
        Ok(url.to_string())
    }

    /// Look the object up. `None` when nothing was uploaded under `key`.
    pub async fn head(&self, key: &str) -> Result<Option<StoredObject>, AppError> {
        match self.objects.head(&Path::from(key)).await {
            Ok(meta) => {
                let size_bytes = i64::try_from(meta.size)
                    .map_err(|_| AppError::Storage(format!("object {key} is too large")))?;
                Ok(Some(StoredObject { size_bytes }))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        match self.objects.delete(&Path::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn storage_error(e: object_store::Error) -> AppError {
    AppError::Storage(e.to_string())
}
