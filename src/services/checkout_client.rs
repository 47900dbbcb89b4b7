//! HTTP client for the hosted checkout provider.
//!
//! Two calls are used:
//! - `POST /checkout/preferences` creates a hosted checkout for a payment
//! - `GET /v1/payments/{id}` fetches the authoritative payment status after a
//!   notification arrives

use serde::Deserialize;
use serde_json::json;

use crate::{
    config::Config,
    error::AppError,
    models::{payment::Payment, plan::Plan, webhook::ProviderPayment},
};

/// Checkout created at the provider.
#[derive(Debug, Deserialize)]
pub struct Preference {
    pub id: String,
    /// Hosted page the buyer is sent to
    pub init_point: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    public_base_url: String,
}

impl CheckoutClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Gateway(format!("HTTP client error: {e}")))?;

        Ok(Self {
            http,
            api_base: config.checkout_api_base.trim_end_matches('/').to_string(),
            access_token: config.checkout_access_token.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.access_token.is_empty() {
            return Err(AppError::Gateway(
                "CHECKOUT_ACCESS_TOKEN is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Request body for a checkout preference.
    pub fn preference_body(&self, payment: &Payment, plan: &Plan) -> serde_json::Value {
        let return_url = format!(
            "{}/dashboard/businesses/{}/plan",
            self.public_base_url, payment.business_id
        );
        json!({
            "items": [{
                "id": plan.tier,
                "title": format!("{} plan", plan.name),
                "quantity": 1,
                "currency_id": payment.currency,
                "unit_price": payment.amount_cents as f64 / 100.0,
            }],
            "external_reference": payment.id.to_string(),
            "notification_url": format!("{}/api/v1/payments/webhook", self.public_base_url),
            "back_urls": {
                "success": return_url,
                "failure": return_url,
                "pending": return_url,
            },
            "auto_return": "approved",
        })
    }

    /// Create a hosted checkout for a pending payment.
    pub async fn create_preference(
        &self,
        payment: &Payment,
        plan: &Plan,
    ) -> Result<Preference, AppError> {
        self.ensure_configured()?;

        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", payment.id.to_string())
            .json(&self.preference_body(payment, plan))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("create preference: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "create preference returned {status}: {body}"
            )));
        }

        response
            .json::<Preference>()
            .await
            .map_err(|e| AppError::Gateway(format!("decode preference: {e}")))
    }

    /// Fetch a payment by the provider's id.
    pub async fn get_payment(&self, provider_payment_id: &str) -> Result<ProviderPayment, AppError> {
        self.ensure_configured()?;

        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.api_base, provider_payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("fetch payment: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "fetch payment {provider_payment_id} returned {status}"
            )));
        }

        response
            .json::<ProviderPayment>()
            .await
            .map_err(|e| AppError::Gateway(format!("decode payment: {e}")))
    }
}
