use std::sync::Arc;

use axum::{routing::get, Router};

use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use payment_cell::router::payment_routes;
use queue_cell::router::queue_routes;
use shared_database::AppState;

use crate::tenants::tenant_admin_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/tenants", tenant_admin_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/queue", queue_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}
