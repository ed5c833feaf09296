use axum::{extract::Path, Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::TenantContext;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&ctx).create(request).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    Extension(ctx): Extension<TenantContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&ctx).get(patient_id).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn list_patients(
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Value>, AppError> {
    let patients = PatientService::new(&ctx).list().await?;
    let total = patients.len();
    Ok(Json(json!({
        "patients": patients,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    Extension(ctx): Extension<TenantContext>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&ctx).update(patient_id, request).await?;
    Ok(Json(json!(patient)))
}
