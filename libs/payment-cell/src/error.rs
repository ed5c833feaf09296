use thiserror::Error;
use uuid::Uuid;

use queue_cell::QueueError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment signature verification failed")]
    InvalidSignature,

    #[error("No payment found for order: {0}")]
    OrderNotFound(String),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment provider error: {message}")]
    Provider { message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Provider {
            message: err.to_string(),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => AppError::Infra(err.to_string()),
            PaymentError::InvalidSignature => AppError::Validation(err.to_string()),
            PaymentError::OrderNotFound(_) | PaymentError::EntryNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            PaymentError::Validation(msg) => AppError::Validation(msg),
            PaymentError::Provider { .. } => AppError::Infra(err.to_string()),
            PaymentError::Queue(e) => AppError::from(e),
            PaymentError::Database(e) => AppError::Infra(e.to_string()),
        }
    }
}
