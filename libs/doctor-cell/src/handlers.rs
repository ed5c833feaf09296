use axum::{extract::Path, Extension, Json};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::TenantContext;
use shared_models::error::AppError;

use crate::models::{CreateDoctorRequest, UpdateDoctorRequest};
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn create_doctor(
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Creating doctor in tenant {} by user {}",
        ctx.schema,
        ctx.user.id()
    );

    let doctor = DoctorService::new(&ctx).create(request).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    Extension(ctx): Extension<TenantContext>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&ctx).get(doctor_id).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_doctors(
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&ctx).list().await?;
    let total = doctors.len();
    Ok(Json(json!({
        "doctors": doctors,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    Extension(ctx): Extension<TenantContext>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&ctx).update(doctor_id, request).await?;
    Ok(Json(json!(doctor)))
}
