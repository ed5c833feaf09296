use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::tenant_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppState>) -> Router {
    // The webhook authenticates by payload signature, not bearer token.
    let public_routes = Router::new().route(
        "/webhook/{tenant_slug}",
        post(handlers::payment_webhook),
    );

    let protected_routes = Router::new()
        .route("/order", post(handlers::create_payment_order))
        .route("/verify", post(handlers::verify_payment))
        .route("/entry/{queue_id}", get(handlers::list_entry_payments))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
