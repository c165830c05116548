use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_models::error::AppError;
use shared_utils::validation::ValidationError;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const MIN_DURATION_MINUTES: i32 = 15;
pub const MAX_DURATION_MINUTES: i32 = 120;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub schedule: DateTime<Utc>,
    pub duration_minutes: i32,
    pub reason: String,
    pub note: Option<String>,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub video_room_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.schedule + Duration::minutes(self.duration_minutes as i64)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Pending and scheduled appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Admins book on behalf of a patient; patients always book for themselves.
    pub patient_id: Option<String>,
    pub doctor_id: String,
    pub schedule: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub schedule: Option<DateTime<Utc>>,
    pub doctor_id: Option<String>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: String,
    pub patient_id: String,
    pub schedule: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub exclude_appointment_id: Option<String>,
}

/// A proposed booking window checked against existing active appointments.
#[derive(Debug, Clone)]
pub struct SlotRequest<'a> {
    pub doctor_id: &'a str,
    pub patient_id: &'a str,
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
    pub exclude_appointment_id: Option<&'a str>,
}

impl SlotRequest<'_> {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DoctorUnavailable,
    PatientOverlap,
    SameDoctorSameDay,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::DoctorUnavailable => {
                write!(f, "The doctor already has an appointment at this time")
            }
            ConflictKind::PatientOverlap => {
                write!(f, "You already have an appointment at this time")
            }
            ConflictKind::SameDoctorSameDay => {
                write!(f, "You already have an appointment with this doctor on this day")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflict: Option<ConflictKind>,
    pub message: Option<String>,
}

impl From<Option<ConflictKind>> for ConflictCheckResponse {
    fn from(conflict: Option<ConflictKind>) -> Self {
        Self {
            has_conflict: conflict.is_some(),
            conflict,
            message: conflict.map(|kind| kind.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTokenResponse {
    pub app_id: String,
    pub room_id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not accepting appointments")]
    DoctorNotAvailable,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Conflict(ConflictKind),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Video call is only available for scheduled appointments")]
    VideoNotReady,

    #[error("Video conferencing service unavailable")]
    VideoServiceUnavailable,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::NotAvailable => AppointmentError::DoctorNotAvailable,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppointmentError::PatientNotFound,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::DoctorNotAvailable
            | AppointmentError::InvalidRequest(_)
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::VideoNotReady => AppError::BadRequest(err.to_string()),
            AppointmentError::InvalidTime(_) | AppointmentError::Validation(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Conflict(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::VideoServiceUnavailable => AppError::ServiceUnavailable(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
