use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use admin_cell::admin_routes;
use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use consultation_cell::consultation_routes;
use doctor_cell::doctor_routes;
use patient_cell::patient_routes;
use prescription_cell::prescription_routes;
use shared_config::AppConfig;

/// Reports which integrations are configured. Secrets are never echoed.
async fn health(State(config): State<Arc<AppConfig>>) -> Json<Value> {
    let status = if config.is_configured() { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "database": config.is_configured(),
        "ai": config.is_ai_configured(),
        "email": config.is_email_configured(),
        "sms": config.is_sms_configured(),
        "video": config.is_video_configured(),
        "admin_passkey": !config.admin_passkey.is_empty()
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "CarePulse API is running!" }))
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/consultations", consultation_routes(state.clone()))
        .nest("/admin", admin_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            storage_bucket: "carepulse-files".to_string(),
            openai_api_key: String::new(),
            openai_base_url: String::new(),
            openai_chat_model: "gpt-4o-mini".to_string(),
            openai_vision_model: "gpt-4o".to_string(),
            openai_realtime_model: "gpt-4o-realtime-preview".to_string(),
            openai_realtime_voice: "alloy".to_string(),
            summary_timeout_secs: 30,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            twilio_api_base_url: String::new(),
            notification_timeout_secs: 2,
            video_app_id: String::new(),
            video_server_secret: String::new(),
            video_token_ttl_secs: 3600,
            admin_passkey: "123456".to_string(),
            server_port: 3000,
        }
    }

    #[tokio::test]
    async fn health_reports_integrations() {
        let app = create_router(Arc::new(test_config()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ai"], false);
        assert_eq!(json["admin_passkey"], true);
    }

    #[tokio::test]
    async fn cells_are_mounted() {
        let app = create_router(Arc::new(test_config()));

        let response = app
            .oneshot(Request::builder().uri("/appointments").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // Reaches the appointment router's auth layer rather than a 404
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
