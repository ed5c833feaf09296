use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(PaymentStatus::Created),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// A payment record tied to a queue entry. Written once by verification,
/// immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub provider: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub queue_id: Uuid,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub payment_id: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key the client hands to the provider's checkout widget.
    pub key_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Body of the provider's webhook; it carries the same verification
/// triple as the client-side call.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

// --- Provider wire types ---

#[derive(Debug, Serialize)]
pub struct ProviderOrderRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}
