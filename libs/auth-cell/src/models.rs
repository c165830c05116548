use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::error::AppError;
use shared_utils::validation::ValidationError;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const ADMIN_SESSION_HOURS: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminPasskeyRequest {
    pub passkey: String,
}

/// Session tokens as handed to the client after sign-up or sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Value,
}

impl AuthSession {
    /// Builds a session from an identity service response. Sign-up answers
    /// with a bare user when email confirmation is pending, otherwise with a
    /// session wrapping the user.
    pub fn from_identity(response: Value) -> Result<Self, AuthError> {
        let user = match response.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => response.clone(),
        };

        let user_id = user["id"]
            .as_str()
            .ok_or_else(|| AuthError::IdentityService("response carries no user id".to_string()))?
            .to_string();

        Ok(Self {
            user_id,
            email: user["email"].as_str().map(str::to_string),
            access_token: response["access_token"].as_str().map(str::to_string),
            refresh_token: response["refresh_token"].as_str().map(str::to_string),
            expires_in: response["expires_in"].as_i64(),
            user,
        })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Password must be at least {MIN_PASSWORD_CHARS} characters and contain a letter and a digit")]
    WeakPassword,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Admin access is not configured")]
    PasskeyNotConfigured,

    #[error("Invalid passkey")]
    InvalidPasskey,

    #[error("Identity service error: {0}")]
    IdentityService(String),

    #[error("Failed to issue token: {0}")]
    TokenIssue(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidPasskey => AppError::Auth(err.to_string()),
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::WeakPassword | AuthError::Validation(_) => AppError::ValidationError(err.to_string()),
            AuthError::PasskeyNotConfigured => AppError::ServiceUnavailable(err.to_string()),
            AuthError::IdentityService(msg) => AppError::ExternalService(msg),
            AuthError::TokenIssue(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn session_from_sign_in_response() {
        let session = AuthSession::from_identity(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "u-1", "email": "jane@example.com" }
        }))
        .unwrap();

        assert_eq!(session.user_id, "u-1");
        assert_eq!(session.access_token.as_deref(), Some("a"));
        assert_eq!(session.expires_in, Some(3600));
    }

    #[test]
    fn session_from_unconfirmed_sign_up() {
        let session = AuthSession::from_identity(json!({ "id": "u-2", "email": "new@example.com" })).unwrap();

        assert_eq!(session.user_id, "u-2");
        assert!(session.access_token.is_none());
    }

    #[test]
    fn response_without_user_is_rejected() {
        assert_matches!(
            AuthSession::from_identity(json!({ "msg": "ok" })),
            Err(AuthError::IdentityService(_))
        );
    }
}
