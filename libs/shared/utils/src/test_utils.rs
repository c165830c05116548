use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub openai_base_url: String,
    pub email_api_url: String,
    pub twilio_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            openai_base_url: "http://localhost:54322/v1".to_string(),
            email_api_url: String::new(),
            twilio_api_base_url: String::new(),
        }
    }
}

impl TestConfig {
    /// Points every vendor endpoint at a single mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            openai_base_url: format!("{}/v1", uri),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_bucket: "carepulse-files".to_string(),
            openai_api_key: "test-openai-key".to_string(),
            openai_base_url: self.openai_base_url.clone(),
            openai_chat_model: "gpt-4o-mini".to_string(),
            openai_vision_model: "gpt-4o".to_string(),
            openai_realtime_model: "gpt-4o-realtime-preview".to_string(),
            openai_realtime_voice: "alloy".to_string(),
            summary_timeout_secs: 2,
            email_api_url: self.email_api_url.clone(),
            email_api_key: if self.email_api_url.is_empty() {
                String::new()
            } else {
                "test-email-key".to_string()
            },
            email_from: "CarePulse <noreply@carepulse.test>".to_string(),
            twilio_account_sid: if self.twilio_api_base_url.is_empty() {
                String::new()
            } else {
                "AC-test".to_string()
            },
            twilio_auth_token: "test-twilio-token".to_string(),
            twilio_from_number: "+15005550006".to_string(),
            twilio_api_base_url: self.twilio_api_base_url.clone(),
            notification_timeout_secs: 1,
            video_app_id: "1234567".to_string(),
            video_server_secret: "test-video-secret".to_string(),
            video_token_ttl_secs: 3600,
            admin_passkey: "123456".to_string(),
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn auth_user_response(user_id: &str, email: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": email,
            "phone": "",
            "user_metadata": { "name": "Test User", "role": "patient" },
            "app_metadata": { "provider": "email" },
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn session_response(user_id: &str, email: &str) -> serde_json::Value {
        json!({
            "access_token": "access-token",
            "refresh_token": "refresh-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": Self::auth_user_response(user_id, email)
        })
    }

    pub fn patient_response(patient_id: &str, email: &str, name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "name": name,
            "email": email,
            "phone": "+14155552671",
            "birth_date": "1990-01-01",
            "gender": "female",
            "address": "14 Harbour Street",
            "occupation": "Engineer",
            "emergency_contact_name": "Sam Doe",
            "emergency_contact_number": "+14155552672",
            "primary_physician": null,
            "insurance_provider": "BlueCross",
            "insurance_policy_number": "BC-0001",
            "allergies": null,
            "current_medication": null,
            "family_medical_history": null,
            "past_medical_history": null,
            "identification_type": "passport",
            "identification_number": "X1234567",
            "identification_document_url": null,
            "treatment_consent": true,
            "disclosure_consent": true,
            "privacy_consent": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor_id: &str, email: &str, name: &str, specialization: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "name": name,
            "email": email,
            "phone": "+14155550100",
            "specialization": specialization,
            "qualification": "MD",
            "experience_years": 10,
            "bio": "Experienced practitioner",
            "image_url": null,
            "consultation_fee": 150.0,
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        schedule: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "schedule": schedule,
            "duration_minutes": 30,
            "reason": "Annual check-up",
            "note": null,
            "status": status,
            "cancellation_reason": null,
            "video_room_id": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
