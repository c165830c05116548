use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::start_consultation))
        .route("/patient/{patient_id}", get(handlers::get_patient_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}/messages", post(handlers::send_message))
        .route("/{consultation_id}/realtime/sdp", post(handlers::realtime_sdp))
        .route("/{consultation_id}/realtime/session", post(handlers::realtime_session))
        .route("/{consultation_id}/transcript", post(handlers::append_transcript))
        .route("/{consultation_id}/end", post(handlers::end_consultation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
