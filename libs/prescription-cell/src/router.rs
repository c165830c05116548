use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use shared_utils::validation::MAX_UPLOAD_REQUEST_BYTES;

use crate::handlers;

pub fn prescription_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::upload_prescription).layer(DefaultBodyLimit::max(MAX_UPLOAD_REQUEST_BYTES)),
        )
        .route("/patient/{patient_id}", get(handlers::get_patient_prescriptions))
        .route(
            "/{prescription_id}",
            get(handlers::get_prescription).delete(handlers::delete_prescription),
        )
        .route("/{prescription_id}/analyze", post(handlers::analyze_prescription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
