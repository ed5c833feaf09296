use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use shared_database::AppState;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;

#[derive(Debug, Deserialize)]
pub struct ProvisionTenantRequest {
    pub slug: String,
    pub display_name: String,
}

pub fn tenant_admin_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(provision_tenant))
        .with_state(state)
}

/// Registers a tenant and brings its schema fully up to date. Intended
/// for platform operators; fine-grained role enforcement sits in front
/// of this API.
#[axum::debug_handler]
pub async fn provision_tenant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ProvisionTenantRequest>,
) -> Result<Json<Value>, AppError> {
    let auth_value = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.starts_with("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let user =
        validate_token(&auth_value[7..], &state.config.jwt_secret).map_err(AppError::Unauthorized)?;

    if user.tenant().is_some() {
        return Err(AppError::Unauthorized(
            "Tenant provisioning requires a global-realm token".to_string(),
        ));
    }

    info!("Provisioning tenant {} by user {}", request.slug, user.id());

    let schema = state
        .provision_tenant(&request.slug, &request.display_name)
        .await
        .map_err(AppError::from)?;

    Ok(Json(json!({
        "slug": request.slug,
        "schema": schema.as_str()
    })))
}
