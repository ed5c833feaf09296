use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use shared_database::{schema, AppState, TenantContext};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Resolves the tenant for a request and attaches a [`TenantContext`] to
/// the request extensions.
///
/// Flow: bearer token validation, slug normalization, allow-list check,
/// pool acquisition, then a best-effort migration catch-up. The catch-up
/// is deliberately fail-open: if it errors the request proceeds and the
/// actual query surfaces the specific failure instead of a masked
/// bootstrap error.
pub async fn tenant_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ));
    }

    let token = &auth_value[7..];

    let user = validate_token(token, &state.config.jwt_secret).map_err(AppError::Unauthorized)?;

    // The tenant claim wins; the header is for service-to-service calls
    // made with global-realm tokens.
    let slug = user
        .tenant()
        .map(str::to_string)
        .or_else(|| {
            request
                .headers()
                .get("X-Tenant-Id")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            AppError::Unauthorized("No tenant claim or X-Tenant-Id header".to_string())
        })?;

    let schema = schema::normalize(&slug).map_err(AppError::from)?;
    state
        .directory
        .assert_allowed(&schema)
        .await
        .map_err(AppError::from)?;

    let pool = state.pools.get_pool(&schema).await.map_err(AppError::from)?;

    if let Err(err) = state.migrator.ensure_tenant_tables(&schema, &pool).await {
        warn!("Tenant bootstrap for {} failed: {}", schema, err);
    }

    request
        .extensions_mut()
        .insert(TenantContext { schema, pool, user });

    Ok(next.run(request).await)
}

/// Extracts the tenant context a middleware layer placed on the request.
pub fn extract_context<B>(request: &Request<B>) -> Result<TenantContext, AppError> {
    request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Tenant context not resolved".to_string()))
}
