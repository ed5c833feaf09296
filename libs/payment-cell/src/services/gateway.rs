use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::error::PaymentError;
use crate::models::{ProviderOrder, ProviderOrderRequest};

type HmacSha256 = Hmac<Sha256>;

/// Checks the provider's order signature: HMAC-SHA256 over
/// `"{order_id}|{payment_id}"`, hex-encoded. The comparison goes through
/// `Mac::verify_slice`, which is constant time.
pub fn verify_order_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> Result<(), PaymentError> {
    let provided = hex::decode(signature).map_err(|_| PaymentError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

    mac.verify_slice(&provided).map_err(|_| {
        debug!("Order signature verification failed for order {}", order_id);
        PaymentError::InvalidSignature
    })
}

/// Checks the webhook signature: HMAC-SHA256 over the raw request body
/// with the webhook secret.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature: &str,
    webhook_secret: &str,
) -> Result<(), PaymentError> {
    let provided = hex::decode(signature).map_err(|_| PaymentError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(payload);

    mac.verify_slice(&provided).map_err(|_| {
        debug!("Webhook signature verification failed");
        PaymentError::InvalidSignature
    })
}

/// HTTP client for the payment provider's order API.
#[derive(Debug)]
pub struct PaymentGatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl PaymentGatewayClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payments_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.payment_base_url.clone(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    /// Creates an order with the provider.
    /// POST {base_url}/orders
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder, PaymentError> {
        info!("Creating provider order for receipt {}", receipt);

        let url = format!("{}/orders", self.base_url);
        let request_body = ProviderOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Provider order creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Provider {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let order: ProviderOrder =
            serde_json::from_str(&response_text).map_err(|e| PaymentError::Provider {
                message: format!("Failed to parse order response: {}", e),
            })?;

        info!("Provider order created: {}", order.id);
        Ok(order)
    }
}
