use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::TenantContext;
use shared_models::error::AppError;

use crate::models::{
    CancelQueueRequest, CompleteQueueRequest, CreateQueueRequest, UpdateQueueRequest,
};
use crate::services::QueueService;

#[derive(Debug, Deserialize)]
pub struct ListQueueQuery {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorQueueQuery {
    /// Explicit current entry; bypasses the rotation ordering.
    pub current: Option<Uuid>,
}

#[axum::debug_handler]
pub async fn create_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateQueueRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Queue booking request in tenant {} by user {}",
        ctx.schema,
        ctx.user.id()
    );

    let entry = QueueService::new(&ctx).create(request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn list_queue_entries(
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<ListQueueQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = QueueService::new(&ctx).list(query.doctor_id).await?;
    let total = entries.len();
    Ok(Json(json!({
        "entries": entries,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx).get(queue_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn update_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
    Json(request): Json<UpdateQueueRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx).update(queue_id, request).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn call_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx).call(queue_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn clock_in_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx).clock_in(queue_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn skip_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx).skip(queue_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn complete_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
    Json(request): Json<CompleteQueueRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx)
        .complete(queue_id, request.prescription)
        .await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn cancel_queue_entry(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
    Json(request): Json<CancelQueueRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx)
        .cancel(queue_id, request.remark)
        .await?;
    Ok(Json(json!(entry)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQueuePaymentRequest {
    pub success: bool,
}

/// Applies a payment outcome directly, e.g. a self-service cash booking
/// being settled at the desk. Online payments go through the payment
/// cell's signature-checked verification instead.
#[axum::debug_handler]
pub async fn verify_queue_payment(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
    Json(request): Json<VerifyQueuePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = QueueService::new(&ctx)
        .verify_payment(queue_id, request.success)
        .await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn get_doctor_queue(
    Extension(ctx): Extension<TenantContext>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorQueueQuery>,
) -> Result<Json<Value>, AppError> {
    let view = QueueService::new(&ctx)
        .get_queue_for_doctor(doctor_id, query.current)
        .await?;
    Ok(Json(json!(view)))
}
