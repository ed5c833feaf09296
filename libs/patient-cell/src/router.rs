use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::tenant_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient).get(handlers::list_patients))
        .route(
            "/{patient_id}",
            get(handlers::get_patient).put(handlers::update_patient),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .with_state(state)
}
