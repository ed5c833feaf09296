use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor with email {0} already exists")]
    EmailExists(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(_) => AppError::NotFound(err.to_string()),
            DoctorError::EmailExists(_) => AppError::Conflict(err.to_string()),
            DoctorError::Validation(msg) => AppError::Validation(msg),
            DoctorError::Database(e) => AppError::Infra(e.to_string()),
        }
    }
}
