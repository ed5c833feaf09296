use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::tenant_middleware;

use crate::handlers;

pub fn queue_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::create_queue_entry).get(handlers::list_queue_entries),
        )
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_queue))
        .route(
            "/{queue_id}",
            get(handlers::get_queue_entry).put(handlers::update_queue_entry),
        )
        .route("/{queue_id}/call", patch(handlers::call_queue_entry))
        .route("/{queue_id}/clock-in", patch(handlers::clock_in_queue_entry))
        .route("/{queue_id}/skip", patch(handlers::skip_queue_entry))
        .route("/{queue_id}/complete", patch(handlers::complete_queue_entry))
        .route("/{queue_id}/cancel", patch(handlers::cancel_queue_entry))
        .route(
            "/{queue_id}/verify-payment",
            patch(handlers::verify_queue_payment),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .with_state(state)
}
