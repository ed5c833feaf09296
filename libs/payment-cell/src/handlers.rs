use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::{schema, AppState, TenantContext};
use shared_models::auth::{AuthUser, GlobalUser, Role};
use shared_models::error::AppError;

use crate::models::{CreateOrderRequest, VerifyPaymentRequest, WebhookPayload};
use crate::services::gateway::{verify_webhook_signature, PaymentGatewayClient};
use crate::services::PaymentService;

#[axum::debug_handler]
pub async fn create_payment_order(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Payment order request in tenant {} for queue entry {}",
        ctx.schema, request.queue_id
    );

    let client = PaymentGatewayClient::new(&state.config).map_err(AppError::from)?;
    let response = PaymentService::new(&ctx)
        .create_order(&client, request)
        .await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let payment = PaymentService::new(&ctx)
        .verify(&state.config.payment_key_secret, request)
        .await?;
    Ok(Json(json!(payment)))
}

#[axum::debug_handler]
pub async fn list_entry_payments(
    Extension(ctx): Extension<TenantContext>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let payments = PaymentService::new(&ctx).get_for_entry(queue_id).await?;
    Ok(Json(json!({ "payments": payments })))
}

/// Provider webhook. There is no bearer token here; the payload signature
/// is the authentication, and the tenant comes from the path.
#[axum::debug_handler]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Path(tenant_slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("X-Webhook-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing webhook signature header".to_string()))?;

    verify_webhook_signature(&body, signature, &state.config.payment_webhook_secret)
        .map_err(AppError::from)?;

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

    info!(
        "Payment webhook {} for tenant {} (order {})",
        payload.event, tenant_slug, payload.order_id
    );

    let schema = schema::normalize(&tenant_slug).map_err(AppError::from)?;
    state
        .directory
        .assert_allowed(&schema)
        .await
        .map_err(AppError::from)?;
    let pool = state.pools.get_pool(&schema).await.map_err(AppError::from)?;

    // Webhook transitions run as the system actor.
    let ctx = TenantContext {
        schema,
        pool,
        user: AuthUser::Global(GlobalUser {
            id: Uuid::nil(),
            email: None,
            role: Role::Admin,
            created_at: None,
        }),
    };

    let payment = PaymentService::new(&ctx)
        .verify(
            &state.config.payment_key_secret,
            VerifyPaymentRequest {
                order_id: payload.order_id,
                payment_id: payload.payment_id,
                signature: payload.signature,
            },
        )
        .await?;

    Ok(Json(json!({ "status": "ok", "payment": payment })))
}
