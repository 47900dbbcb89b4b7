//! Inbound payment-provider notifications.
//!
//! # Webhook Flow
//!
//! 1. The provider POSTs a notification to `/api/v1/payments/webhook`
//! 2. The `x-signature` header is verified with HMAC-SHA256
//! 3. The raw payload is stored in `webhook_events` (deduplicated by event id)
//! 4. Payment notifications fetch the authoritative payment from the provider
//!    and move the local payment through its lifecycle
//!
//! # Signature
//!
//! `x-signature: ts=<unix-ts>,v1=<hex hmac>` where the HMAC is computed over
//! the manifest `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::FromRow;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Stored notification.
///
/// # Database Table
///
/// Maps to the `webhook_events` table. `provider_event_id` is unique so a
/// redelivered notification is recorded once.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider_event_id: String,
    pub event_type: String,
    pub resource_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Notification body as sent by the provider.
///
/// ```json
/// {
///   "id": 12345,
///   "type": "payment",
///   "action": "payment.updated",
///   "data": { "id": "999999999" }
/// }
/// ```
///
/// Ids arrive as numbers or strings depending on the provider API version,
/// so they are kept as raw JSON and normalized with [`id_string`].
#[derive(Debug, Deserialize)]
pub struct ProviderNotification {
    pub id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub action: Option<String>,
    pub data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationData {
    pub id: serde_json::Value,
}

impl ProviderNotification {
    /// Resource id the notification refers to (`data.id`).
    pub fn resource_id(&self) -> Option<String> {
        self.data.as_ref().and_then(|d| id_string(&d.id))
    }

    /// Event type, falling back to the prefix of `action` (`payment.updated`).
    pub fn kind(&self) -> String {
        self.event_type
            .clone()
            .or_else(|| {
                self.action
                    .as_deref()
                    .and_then(|a| a.split('.').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Identifier used to deduplicate deliveries.
    ///
    /// Prefers the provider's event id; otherwise the combination of type,
    /// action and resource identifies the notification.
    pub fn dedupe_key(&self) -> String {
        match self.id.as_ref().and_then(id_string) {
            Some(id) => id,
            None => format!(
                "{}:{}:{}",
                self.kind(),
                self.action.as_deref().unwrap_or(""),
                self.resource_id().unwrap_or_default()
            ),
        }
    }
}

/// Render a JSON id (number or string) as a string.
pub fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Payment as reported by the provider's payments API.
#[derive(Debug, Deserialize)]
pub struct ProviderPayment {
    pub status: String,
    pub external_reference: Option<String>,
}

/// Parsed `x-signature` header.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parse `ts=<ts>,v1=<hex>`. Order and surrounding spaces do not matter.
    pub fn parse(header: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;
        for part in header.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }
        Some(Self { ts: ts?, v1: v1? })
    }
}

/// Build the string the provider signs.
pub fn signature_manifest(resource_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{resource_id};request-id:{request_id};ts:{ts};")
}

fn manifest_mac(secret: &str, manifest: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(manifest.as_bytes());
    Some(mac)
}

/// Compute the hex HMAC-SHA256 of a manifest, as the provider sends it in
/// `v1`.
pub fn sign_manifest(secret: &str, manifest: &str) -> String {
    manifest_mac(secret, manifest)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Verify a notification signature in constant time.
///
/// An empty secret never verifies.
pub fn verify_signature(
    secret: &str,
    header: &SignatureHeader,
    resource_id: &str,
    request_id: &str,
) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(&header.v1) else {
        return false;
    };
    let manifest = signature_manifest(resource_id, request_id, &header.ts);
    manifest_mac(secret, &manifest).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_signature_header_in_any_order() {
        assert_eq!(
            SignatureHeader::parse("ts=1704908010,v1=abcd"),
            Some(SignatureHeader {
                ts: "1704908010".into(),
                v1: "abcd".into()
            })
        );
        assert_eq!(
            SignatureHeader::parse(" v1=abcd , ts=17 "),
            Some(SignatureHeader {
                ts: "17".into(),
                v1: "abcd".into()
            })
        );
        assert_eq!(SignatureHeader::parse("ts=17"), None);
        assert_eq!(SignatureHeader::parse("garbage"), None);
    }

    #[test]
    fn signature_round_trip() {
        let manifest = signature_manifest("999", "req-1", "1704908010");
        assert_eq!(manifest, "id:999;request-id:req-1;ts:1704908010;");

        let header = SignatureHeader {
            ts: "1704908010".into(),
            v1: sign_manifest("s3cret", &manifest),
        };
        assert!(verify_signature("s3cret", &header, "999", "req-1"));
        assert!(!verify_signature("other", &header, "999", "req-1"));
        assert!(!verify_signature("s3cret", &header, "1000", "req-1"));
        assert!(!verify_signature("", &header, "999", "req-1"));
    }

    #[test]
    fn non_hex_signature_fails() {
        let header = SignatureHeader {
            ts: "1".into(),
            v1: "not-hex".into(),
        };
        assert!(!verify_signature("s3cret", &header, "1", "r"));
    }

    #[test]
    fn notification_ids_accept_numbers_and_strings() {
        let n: ProviderNotification = serde_json::from_value(json!({
            "id": 12345,
            "type": "payment",
            "action": "payment.updated",
            "data": { "id": "999" }
        }))
        .unwrap();
        assert_eq!(n.dedupe_key(), "12345");
        assert_eq!(n.resource_id().as_deref(), Some("999"));
        assert_eq!(n.kind(), "payment");

        let n: ProviderNotification = serde_json::from_value(json!({
            "action": "payment.created",
            "data": { "id": 42 }
        }))
        .unwrap();
        assert_eq!(n.kind(), "payment");
        assert_eq!(n.dedupe_key(), "payment:payment.created:42");
    }

    #[test]
    fn provider_payment_ignores_fields_it_does_not_use() {
        let payment: ProviderPayment = serde_json::from_value(json!({
            "id": 9001,
            "status": "approved",
            "status_detail": "accredited",
            "external_reference": "3f1c2b9e-0000-4000-8000-000000000001"
        }))
        .unwrap();
        assert_eq!(payment.status, "approved");
        assert!(payment.external_reference.is_some());
    }
}
