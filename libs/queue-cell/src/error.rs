use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::QueueStatus;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Patient already has an active booking with this doctor today: {existing_id}")]
    DuplicateBooking { existing_id: Uuid },

    #[error("Invalid status transition from {from} to {to}; operation requires status {required}")]
    InvalidTransition {
        from: QueueStatus,
        to: QueueStatus,
        required: &'static str,
    },

    #[error("Corrupt queue entry {id}: {detail}")]
    Corrupt { id: Uuid, detail: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::EntryNotFound(_) | QueueError::DoctorNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            QueueError::DuplicateBooking { .. } => AppError::Conflict(err.to_string()),
            QueueError::InvalidTransition { .. } => AppError::StateConflict(err.to_string()),
            QueueError::Corrupt { .. } => AppError::Infra(err.to_string()),
            QueueError::Validation(msg) => AppError::Validation(msg),
            QueueError::Database(e) => AppError::Infra(e.to_string()),
        }
    }
}
