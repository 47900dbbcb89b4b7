//! Image metadata and upload request/response types.
//!
//! Files never pass through this server. Clients ask for a presigned URL,
//! `PUT` the bytes straight into object storage, then report completion so
//! the metadata row can be recorded.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted upload: 5 MiB.
pub const MAX_UPLOAD_BYTES: i64 = 5 * 1024 * 1024;

/// What an image is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Logo,
    Cover,
    Product,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Logo => "logo",
            ImageKind::Cover => "cover",
            ImageKind::Product => "product",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logo" => Ok(ImageKind::Logo),
            "cover" => Ok(ImageKind::Cover),
            "product" => Ok(ImageKind::Product),
            other => Err(format!("unknown image kind '{other}'")),
        }
    }
}

/// Row from the `images` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Image {
    pub id: Uuid,
    pub business_id: Uuid,
    pub product_id: Option<Uuid>,
    pub kind: String,

    /// Storage key, unique across the bucket
    pub object_key: String,

    /// Public URL the storefront renders
    pub url: String,

    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Request a presigned upload URL.
///
/// ```json
/// {
///   "kind": "product",
///   "product_id": "550e8400-e29b-41d4-a716-446655440000",
///   "file_name": "loaf.jpg",
///   "content_type": "image/jpeg",
///   "size_bytes": 482113
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct PresignUploadRequest {
    pub kind: ImageKind,
    pub product_id: Option<Uuid>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize)]
pub struct PresignUploadResponse {
    pub upload_url: String,
    pub object_key: String,
    pub public_url: String,
    pub expires_in: u64,
}

/// Report that the client finished its `PUT`.
#[derive(Debug, Deserialize)]
pub struct CompleteUploadRequest {
    pub kind: ImageKind,
    pub product_id: Option<Uuid>,
    pub object_key: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// Validate an upload's shape and return the file extension for its key.
pub fn validate_upload(
    kind: ImageKind,
    product_id: Option<Uuid>,
    content_type: &str,
    size_bytes: i64,
) -> Result<&'static str, String> {
    let extension = extension_for(content_type)
        .ok_or_else(|| format!("content type '{content_type}' is not an accepted image type"))?;

    if size_bytes <= 0 {
        return Err("size_bytes must be positive".to_string());
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(format!("file exceeds {MAX_UPLOAD_BYTES} bytes"));
    }

    match (kind, product_id) {
        (ImageKind::Product, None) => Err("product images require product_id".to_string()),
        (ImageKind::Logo | ImageKind::Cover, Some(_)) => {
            Err(format!("{kind} images cannot reference a product"))
        }
        _ => Ok(extension),
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Prefix every object of a business lives under.
pub fn business_prefix(business_id: Uuid) -> String {
    format!("businesses/{business_id}/")
}

/// Build a fresh, collision-free object key for an upload.
pub fn object_key(business_id: Uuid, kind: ImageKind, extension: &str) -> String {
    format!(
        "{}{}/{}.{}",
        business_prefix(business_id),
        kind,
        Uuid::new_v4(),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_images() {
        let product = Some(Uuid::new_v4());
        assert_eq!(
            validate_upload(ImageKind::Product, product, "image/jpeg", 1024),
            Ok("jpg")
        );
        assert_eq!(
            validate_upload(ImageKind::Logo, None, "IMAGE/PNG", 1024),
            Ok("png")
        );
        assert_eq!(
            validate_upload(ImageKind::Cover, None, "image/webp", MAX_UPLOAD_BYTES),
            Ok("webp")
        );
    }

    #[test]
    fn rejects_bad_uploads() {
        assert!(validate_upload(ImageKind::Logo, None, "application/pdf", 10).is_err());
        assert!(validate_upload(ImageKind::Logo, None, "image/png", 0).is_err());
        assert!(validate_upload(ImageKind::Logo, None, "image/png", MAX_UPLOAD_BYTES + 1).is_err());
        assert!(validate_upload(ImageKind::Product, None, "image/png", 10).is_err());
        assert!(validate_upload(ImageKind::Cover, Some(Uuid::new_v4()), "image/png", 10).is_err());
    }

    #[test]
    fn object_keys_live_under_business_prefix() {
        let business = Uuid::new_v4();
        let key = object_key(business, ImageKind::Product, "jpg");
        assert!(key.starts_with(&business_prefix(business)));
        assert!(key.contains("/product/"));
        assert!(key.ends_with(".jpg"));
        assert_ne!(key, object_key(business, ImageKind::Product, "jpg"));
    }
}
