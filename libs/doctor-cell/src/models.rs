use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;
use shared_utils::validation::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub consultation_fee: Option<f64>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Name as shown to patients, e.g. "Dr. Adam Smith".
    pub fn display_name(&self) -> String {
        if self.name.starts_with("Dr.") {
            self.name.clone()
        } else {
            format!("Dr. {}", self.name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    /// Only honoured for admins creating a profile on behalf of a doctor account.
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub consultation_fee: Option<f64>,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    pub qualification: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    pub specialization: Option<String>,
    pub available_only: Option<bool>,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor is not accepting appointments")]
    NotAvailable,

    #[error("A doctor profile already exists for this account")]
    AlreadyRegistered,

    #[error("Doctor with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Unauthorized access to doctor data")]
    UnauthorizedAccess,

    #[error("Invalid doctor profile: {0}")]
    InvalidProfile(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::NotAvailable => AppError::BadRequest(err.to_string()),
            DoctorError::AlreadyRegistered | DoctorError::EmailAlreadyExists { .. } => {
                AppError::Conflict(err.to_string())
            }
            DoctorError::UnauthorizedAccess => AppError::Forbidden(err.to_string()),
            DoctorError::InvalidProfile(_) | DoctorError::Validation(_) => {
                AppError::ValidationError(err.to_string())
            }
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
