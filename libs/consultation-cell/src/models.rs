use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_ai::AiError;
use shared_models::error::AppError;
use shared_utils::validation::ValidationError;

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    #[default]
    Text,
    Voice,
}

impl fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationMode::Text => write!(f, "text"),
            ConsultationMode::Voice => write!(f, "voice"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Active,
    Summarizing,
    Completed,
    Failed,
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Active => write!(f, "active"),
            ConsultationStatus::Summarizing => write!(f, "summarizing"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConsultationMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub patient_id: String,
    pub appointment_id: Option<String>,
    pub mode: ConsultationMode,
    pub status: ConsultationStatus,
    #[serde(default)]
    pub messages: Vec<ConsultationMessage>,
    pub summary: Option<String>,
    pub summary_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Consultation {
    pub fn ensure_active(&self) -> Result<(), ConsultationError> {
        if self.status != ConsultationStatus::Active {
            return Err(ConsultationError::NotActive(self.status));
        }
        Ok(())
    }

    pub fn ensure_mode(&self, mode: ConsultationMode) -> Result<(), ConsultationError> {
        if self.mode != mode {
            return Err(ConsultationError::WrongMode(mode));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConsultationRequest {
    /// Defaults to the caller.
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub mode: ConsultationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRequest {
    pub entries: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageExchange {
    pub reply: ConsultationMessage,
    pub consultation: Consultation,
}

#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Unauthorized access to consultation")]
    Unauthorized,

    #[error("Consultation is {0} and no longer accepts input")]
    NotActive(ConsultationStatus),

    #[error("This operation requires a {0} consultation")]
    WrongMode(ConsultationMode),

    #[error("Consultation cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("AI assistant is unavailable")]
    AiUnavailable,

    #[error("AI assistant failed: {0}")]
    AiFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AiError> for ConsultationError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured => ConsultationError::AiUnavailable,
            other => ConsultationError::AiFailed(other.to_string()),
        }
    }
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound => AppError::NotFound(err.to_string()),
            ConsultationError::Unauthorized => AppError::Forbidden(err.to_string()),
            ConsultationError::NotActive(_)
            | ConsultationError::WrongMode(_)
            | ConsultationError::InvalidStatusTransition { .. }
            | ConsultationError::InvalidRequest(_) => AppError::BadRequest(err.to_string()),
            ConsultationError::Validation(_) => AppError::ValidationError(err.to_string()),
            ConsultationError::AiUnavailable => AppError::ServiceUnavailable(err.to_string()),
            ConsultationError::AiFailed(msg) => AppError::ExternalService(msg),
            ConsultationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn consultation(status: ConsultationStatus, mode: ConsultationMode) -> Consultation {
        serde_json::from_value(json!({
            "id": "c-1",
            "patient_id": "p-1",
            "appointment_id": null,
            "mode": mode,
            "status": status,
            "summary": null,
            "summary_error": null,
            "started_at": "2026-01-10T09:00:00Z",
            "ended_at": null
        }))
        .unwrap()
    }

    #[test]
    fn missing_messages_default_to_empty() {
        let c = consultation(ConsultationStatus::Active, ConsultationMode::Text);
        assert!(c.messages.is_empty());
    }

    #[test]
    fn start_request_defaults_to_text() {
        let req: StartConsultationRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.mode, ConsultationMode::Text);
        assert!(req.patient_id.is_none());
    }

    #[test]
    fn guards_report_state() {
        let done = consultation(ConsultationStatus::Completed, ConsultationMode::Voice);
        assert_matches!(
            done.ensure_active(),
            Err(ConsultationError::NotActive(ConsultationStatus::Completed))
        );
        assert_matches!(
            done.ensure_mode(ConsultationMode::Text),
            Err(ConsultationError::WrongMode(ConsultationMode::Text))
        );
        assert!(done.ensure_mode(ConsultationMode::Voice).is_ok());
    }

    #[test]
    fn errors_map_to_status_codes() {
        use axum::http::StatusCode;

        assert_eq!(
            AppError::from(ConsultationError::NotActive(ConsultationStatus::Failed)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ConsultationError::from(AiError::NotConfigured)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(ConsultationError::AiFailed("x".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
