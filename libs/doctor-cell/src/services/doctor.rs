use tracing::debug;
use uuid::Uuid;

use shared_database::TenantContext;

use crate::error::DoctorError;
use crate::models::{CreateDoctorRequest, Doctor, UpdateDoctorRequest};

const DOCTOR_COLUMNS: &str =
    "id, full_name, specialty, email, last_sequence_number, is_active, created_at, updated_at";

pub struct DoctorService<'a> {
    ctx: &'a TenantContext,
}

impl<'a> DoctorService<'a> {
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    /// Registers a new doctor. The ticket counter starts at zero.
    pub async fn create(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for: {}", request.email);

        if request.full_name.trim().is_empty() {
            return Err(DoctorError::Validation("full_name is required".to_string()));
        }

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM doctors WHERE email = $1")
                .bind(&request.email)
                .fetch_optional(&self.ctx.pool)
                .await?;
        if existing.is_some() {
            return Err(DoctorError::EmailExists(request.email));
        }

        let doctor: Doctor = sqlx::query_as(&format!(
            "INSERT INTO doctors (full_name, specialty, email) \
             VALUES ($1, $2, $3) RETURNING {DOCTOR_COLUMNS}"
        ))
        .bind(request.full_name.trim())
        .bind(&request.specialty)
        .bind(&request.email)
        .fetch_one(&self.ctx.pool)
        .await?;

        debug!("Doctor profile created with id: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get(&self, id: Uuid) -> Result<Doctor, DoctorError> {
        let doctor: Option<Doctor> = sqlx::query_as(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.pool)
        .await?;

        doctor.ok_or(DoctorError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Doctor>, DoctorError> {
        let doctors: Vec<Doctor> = sqlx::query_as(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE is_active ORDER BY full_name"
        ))
        .fetch_all(&self.ctx.pool)
        .await?;

        Ok(doctors)
    }

    /// Partial update; absent fields keep their value. The ticket counter
    /// is owned by the queue and is not touchable here.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        let doctor: Option<Doctor> = sqlx::query_as(&format!(
            "UPDATE doctors SET \
                 full_name = COALESCE($2, full_name), \
                 specialty = COALESCE($3, specialty), \
                 is_active = COALESCE($4, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {DOCTOR_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.specialty)
        .bind(request.is_active)
        .fetch_optional(&self.ctx.pool)
        .await?;

        doctor.ok_or(DoctorError::NotFound(id))
    }
}
