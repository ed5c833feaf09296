use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::tenant_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_doctor).get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor).put(handlers::update_doctor))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .with_state(state)
}
