use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum TenantError {
    #[error("Invalid tenant identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Tenant not allowed: {0}")]
    NotAllowed(String),

    #[error("Migration {version} failed: {source}")]
    Migration {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::InvalidIdentifier(msg) => AppError::Validation(msg),
            TenantError::NotAllowed(msg) => AppError::Unauthorized(msg),
            TenantError::Migration { .. } => AppError::Infra(err.to_string()),
            TenantError::Database(e) => AppError::Infra(e.to_string()),
        }
    }
}
