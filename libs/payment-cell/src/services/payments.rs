use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{info, warn};
use uuid::Uuid;

use queue_cell::{PaymentMode, QueueService};
use shared_database::TenantContext;

use crate::error::PaymentError;
use crate::models::{
    CreateOrderRequest, CreateOrderResponse, Payment, PaymentStatus, VerifyPaymentRequest,
};
use crate::services::gateway::{verify_order_signature, PaymentGatewayClient};

const PAYMENT_COLUMNS: &str = "id, reference_type, reference_id, provider, order_id, \
     payment_id, signature, amount, currency, status, created_at, updated_at";

const PROVIDER: &str = "razorpay";

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    reference_type: String,
    reference_id: Uuid,
    provider: String,
    order_id: Option<String>,
    payment_id: Option<String>,
    signature: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PaymentError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status).ok_or_else(|| {
            PaymentError::Validation(format!(
                "payment {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(Payment {
            id: row.id,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            provider: row.provider,
            order_id: row.order_id,
            payment_id: row.payment_id,
            signature: row.signature,
            amount: row.amount,
            currency: row.currency,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Bridges queue bookings to the payment provider and gates the queue
/// status on verification outcomes.
pub struct PaymentService<'a> {
    ctx: &'a TenantContext,
}

impl<'a> PaymentService<'a> {
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    /// Creates a provider order for an online booking and records the
    /// pending payment against the queue entry.
    pub async fn create_order(
        &self,
        client: &PaymentGatewayClient,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, PaymentError> {
        if request.amount <= 0 {
            return Err(PaymentError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let entry: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, payment_mode FROM queue_entries WHERE id = $1")
                .bind(request.queue_id)
                .fetch_optional(&self.ctx.pool)
                .await?;
        let (queue_id, payment_mode) =
            entry.ok_or(PaymentError::EntryNotFound(request.queue_id))?;

        if PaymentMode::parse(&payment_mode) != Some(PaymentMode::Online) {
            return Err(PaymentError::Validation(format!(
                "queue entry {} is not an online booking",
                queue_id
            )));
        }

        let receipt = format!("qe_{}", queue_id.simple());
        let order = client
            .create_order(request.amount, &request.currency, &receipt)
            .await?;

        let row: PaymentRow = sqlx::query_as(&format!(
            "INSERT INTO payments \
                 (reference_type, reference_id, provider, order_id, amount, currency, status) \
             VALUES ('queue_entry', $1, $2, $3, $4, $5, 'created') \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(queue_id)
        .bind(PROVIDER)
        .bind(&order.id)
        .bind(request.amount)
        .bind(&request.currency)
        .fetch_one(&self.ctx.pool)
        .await?;

        sqlx::query("UPDATE queue_entries SET payment_id = $2 WHERE id = $1")
            .bind(queue_id)
            .bind(row.id)
            .execute(&self.ctx.pool)
            .await?;

        info!(
            "Created payment {} (order {}) for queue entry {}",
            row.id, order.id, queue_id
        );

        Ok(CreateOrderResponse {
            payment_id: row.id,
            order_id: order.id,
            amount: row.amount,
            currency: row.currency,
            key_id: client.key_id().to_string(),
        })
    }

    /// Verifies a provider signature and settles the payment.
    ///
    /// Success books the linked queue entry; failure marks the payment
    /// failed and leaves the entry untouched. Re-verifying an already
    /// paid order is a no-op, so the client call and the provider
    /// webhook can both land.
    pub async fn verify(
        &self,
        key_secret: &str,
        request: VerifyPaymentRequest,
    ) -> Result<Payment, PaymentError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(&request.order_id)
        .fetch_optional(&self.ctx.pool)
        .await?;
        let payment: Payment = row
            .ok_or_else(|| PaymentError::OrderNotFound(request.order_id.clone()))?
            .try_into()?;

        if payment.status == PaymentStatus::Paid {
            return Ok(payment);
        }

        if let Err(err) = verify_order_signature(
            &request.order_id,
            &request.payment_id,
            &request.signature,
            key_secret,
        ) {
            warn!(
                "Rejecting payment verification for order {}: {}",
                request.order_id, err
            );
            sqlx::query("UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .execute(&self.ctx.pool)
                .await?;
            return Err(err);
        }

        // Book the entry first: if the process dies between the two
        // writes, a retry re-verifies and settles the payment row.
        QueueService::new(self.ctx)
            .verify_payment(payment.reference_id, true)
            .await?;

        let row: PaymentRow = sqlx::query_as(&format!(
            "UPDATE payments \
             SET payment_id = $2, signature = $3, status = 'paid', updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(&request.payment_id)
        .bind(&request.signature)
        .fetch_one(&self.ctx.pool)
        .await?;

        info!("Payment {} settled for order {}", payment.id, request.order_id);
        row.try_into()
    }

    pub async fn get_for_entry(&self, queue_id: Uuid) -> Result<Vec<Payment>, PaymentError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE reference_type = 'queue_entry' AND reference_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(queue_id)
        .fetch_all(&self.ctx.pool)
        .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
