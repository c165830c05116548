use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use shared_ai::AiError;
use shared_models::error::AppError;
use shared_utils::validation::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub appointment_id: Option<String>,
    pub doctor_id: Option<String>,
    pub uploaded_by: String,
    pub file_name: String,
    pub file_type: String,
    pub file_url: String,
    pub storage_path: String,
    pub notes: Option<String>,
    pub analysis: Option<PrescriptionAnalysis>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

/// Structured reading of a prescription image produced by the vision model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f32,
}

/// Models sometimes answer `null` for fields they could not read.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPrescriptionRequest {
    pub patient_id: String,
    pub appointment_id: Option<String>,
    pub doctor_id: Option<String>,
    pub file_name: String,
    pub file_type: String,
    /// Base64 file content, optionally prefixed with a data URI header.
    pub file_data: String,
    pub notes: Option<String>,
}

#[derive(Debug, Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Unauthorized access to prescription")]
    Unauthorized,

    #[error("Only image prescriptions can be analyzed")]
    NotAnImage,

    #[error("Prescription analysis is unavailable")]
    AnalysisUnavailable,

    #[error("Prescription analysis failed: {0}")]
    AnalysisFailed(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AiError> for PrescriptionError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured => PrescriptionError::AnalysisUnavailable,
            other => PrescriptionError::AnalysisFailed(other.to_string()),
        }
    }
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::NotFound => AppError::NotFound(err.to_string()),
            PrescriptionError::Unauthorized => AppError::Forbidden(err.to_string()),
            PrescriptionError::NotAnImage => AppError::BadRequest(err.to_string()),
            PrescriptionError::Validation(_) => AppError::ValidationError(err.to_string()),
            PrescriptionError::AnalysisUnavailable => AppError::ServiceUnavailable(err.to_string()),
            PrescriptionError::AnalysisFailed(msg) | PrescriptionError::StorageError(msg) => {
                AppError::ExternalService(msg)
            }
            PrescriptionError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
