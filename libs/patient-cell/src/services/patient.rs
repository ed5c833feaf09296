use tracing::debug;
use uuid::Uuid;

use shared_database::TenantContext;

use crate::error::PatientError;
use crate::models::{CreatePatientRequest, Patient, UpdatePatientRequest};

const PATIENT_COLUMNS: &str =
    "id, full_name, phone, email, date_of_birth, created_at, updated_at";

pub struct PatientService<'a> {
    ctx: &'a TenantContext,
}

impl<'a> PatientService<'a> {
    pub fn new(ctx: &'a TenantContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        if request.full_name.trim().is_empty() {
            return Err(PatientError::Validation("full_name is required".to_string()));
        }

        let patient: Patient = sqlx::query_as(&format!(
            "INSERT INTO patients (full_name, phone, email, date_of_birth) \
             VALUES ($1, $2, $3, $4) RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(request.full_name.trim())
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.date_of_birth)
        .fetch_one(&self.ctx.pool)
        .await?;

        debug!("Patient record created with id: {}", patient.id);
        Ok(patient)
    }

    pub async fn get(&self, id: Uuid) -> Result<Patient, PatientError> {
        let patient: Option<Patient> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.ctx.pool)
        .await?;

        patient.ok_or(PatientError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Patient>, PatientError> {
        let patients: Vec<Patient> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY full_name"
        ))
        .fetch_all(&self.ctx.pool)
        .await?;

        Ok(patients)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let patient: Option<Patient> = sqlx::query_as(&format!(
            "UPDATE patients SET \
                 full_name = COALESCE($2, full_name), \
                 phone = COALESCE($3, phone), \
                 email = COALESCE($4, email), \
                 date_of_birth = COALESCE($5, date_of_birth), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.date_of_birth)
        .fetch_optional(&self.ctx.pool)
        .await?;

        patient.ok_or(PatientError::NotFound(id))
    }
}
