use chrono::Duration;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{User, ROLE_ADMIN, ROLE_PATIENT};
use shared_utils::jwt::issue_token;
use shared_utils::validation::{normalize_email, validate_email, validate_length, validate_phone};

use crate::models::{
    AuthError, AuthSession, LoginRequest, RegisterRequest, ADMIN_SESSION_HOURS, MIN_PASSWORD_CHARS,
};
use crate::services::passkey::passkey_matches;

pub const ADMIN_USER_ID: &str = "admin";

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_CHARS;
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_letter && has_digit {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

pub struct AuthService {
    supabase: SupabaseClient,
    patients: PatientService,
    jwt_secret: String,
    admin_passkey: String,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            jwt_secret: config.supabase_jwt_secret.clone(),
            admin_passkey: config.admin_passkey.clone(),
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, AuthError> {
        validate_length("name", &request.name, 2, 50)?;
        validate_email(&request.email)?;
        validate_phone(&request.phone)?;
        validate_password(&request.password)?;

        let email = normalize_email(&request.email);
        debug!("Registering account for {}", email);

        let metadata = json!({
            "name": request.name.trim(),
            "phone": request.phone.trim(),
            "role": ROLE_PATIENT
        });

        let response = self
            .supabase
            .sign_up(&email, &request.password, metadata)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("already registered") || msg.contains("user_already_exists") {
                    AuthError::EmailTaken
                } else {
                    AuthError::IdentityService(msg)
                }
            })?;

        let session = AuthSession::from_identity(response)?;
        info!("Registered user {}", session.user_id);
        Ok(session)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&request.email);
        debug!("Signing in {}", email);

        let response = self
            .supabase
            .sign_in_with_password(&email, &request.password)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                // Wrong credentials come back as 400 invalid_grant
                if msg.starts_with("Authentication error") || msg.starts_with("API error (400") {
                    warn!("Failed sign-in for {}", email);
                    AuthError::InvalidCredentials
                } else {
                    AuthError::IdentityService(msg)
                }
            })?;

        AuthSession::from_identity(response)
    }

    pub async fn logout(&self, auth_token: &str) -> Result<(), AuthError> {
        self.supabase
            .sign_out(auth_token)
            .await
            .map_err(|e| AuthError::IdentityService(e.to_string()))
    }

    /// Identity profile plus the caller's patient record, if registered.
    pub async fn profile(&self, user: &User, auth_token: &str) -> Result<Value, AuthError> {
        let identity = self
            .supabase
            .get_user_profile(auth_token)
            .await
            .map_err(|e| AuthError::IdentityService(e.to_string()))?;

        let patient = match self.patients.find_patient(&user.id, auth_token).await {
            Ok(patient) => patient,
            Err(e) => {
                warn!("Could not load patient record for {}: {}", user.id, e);
                None
            }
        };

        Ok(json!({
            "user_id": user.id,
            "role": user.role,
            "identity": identity,
            "patient": patient
        }))
    }

    /// Exchanges the admin passkey for a short-lived admin token.
    pub fn admin_session(&self, passkey: &str) -> Result<Value, AuthError> {
        if self.admin_passkey.is_empty() {
            return Err(AuthError::PasskeyNotConfigured);
        }

        if !passkey_matches(&self.admin_passkey, passkey.trim(), self.jwt_secret.as_bytes()) {
            warn!("Rejected admin passkey attempt");
            return Err(AuthError::InvalidPasskey);
        }

        let ttl = Duration::hours(ADMIN_SESSION_HOURS);
        let token = issue_token(ADMIN_USER_ID, None, ROLE_ADMIN, &self.jwt_secret, ttl)
            .map_err(AuthError::TokenIssue)?;

        info!("Issued admin session");
        Ok(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": ttl.num_seconds(),
            "role": ROLE_ADMIN
        }))
    }
}
