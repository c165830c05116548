use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_ai::OpenAiClient;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::{decode_upload, extension_for, validate_length};

use crate::models::{Prescription, PrescriptionError, UploadPrescriptionRequest};
use crate::services::analysis::PrescriptionAnalyzer;

pub struct PrescriptionService {
    supabase: SupabaseClient,
    analyzer: Option<PrescriptionAnalyzer>,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        let analyzer = match OpenAiClient::new(config) {
            Ok(ai) => Some(PrescriptionAnalyzer::new(ai)),
            Err(e) => {
                debug!("Prescription analysis disabled: {}", e);
                None
            }
        };

        Self {
            supabase: SupabaseClient::new(config),
            analyzer,
        }
    }

    /// Patients see their own prescriptions; doctors and admins see all.
    fn can_view(user: &User, patient_id: &str) -> bool {
        user.id == patient_id || user.is_doctor() || user.is_admin()
    }

    pub async fn upload_prescription(
        &self,
        user: &User,
        request: UploadPrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        if !Self::can_view(user, &request.patient_id) {
            return Err(PrescriptionError::Unauthorized);
        }

        validate_length("file_name", &request.file_name, 1, 255)?;
        let extension = extension_for(&request.file_type)?;
        let bytes = decode_upload(&request.file_data)?;

        let storage_path = format!("prescriptions/{}/{}.{}", request.patient_id, Uuid::new_v4(), extension);
        debug!("Uploading prescription ({} bytes) to {}", bytes.len(), storage_path);

        self.supabase
            .upload_object(&storage_path, bytes, &request.file_type, auth_token)
            .await
            .map_err(|e| PrescriptionError::StorageError(e.to_string()))?;

        let doctor_id = request
            .doctor_id
            .clone()
            .or_else(|| user.is_doctor().then(|| user.id.clone()));

        let record = json!({
            "patient_id": request.patient_id,
            "appointment_id": request.appointment_id,
            "doctor_id": doctor_id,
            "uploaded_by": user.id,
            "file_name": request.file_name.trim(),
            "file_type": request.file_type,
            "file_url": self.supabase.public_url(&storage_path),
            "storage_path": storage_path,
            "notes": request.notes,
            "analysis": null,
            "analyzed_at": null,
            "created_at": Utc::now().to_rfc3339()
        });

        let prescription: Prescription = match self
            .supabase
            .insert_returning("prescriptions", record, auth_token)
            .await
        {
            Ok(prescription) => prescription,
            Err(e) => {
                // Best-effort cleanup of the orphaned upload
                if let Err(cleanup) = self.supabase.delete_object(&storage_path, auth_token).await {
                    warn!("Failed to remove orphaned upload {}: {}", storage_path, cleanup);
                }
                return Err(PrescriptionError::DatabaseError(e.to_string()));
            }
        };

        info!("Prescription {} uploaded for patient {}", prescription.id, prescription.patient_id);
        Ok(prescription)
    }

    async fn fetch(&self, prescription_id: &str, auth_token: &str) -> Result<Prescription, PrescriptionError> {
        let path = format!("/rest/v1/prescriptions?id=eq.{}", urlencoding::encode(prescription_id));
        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrescriptionError::NotFound);
        }

        serde_json::from_value(result.swap_remove(0))
            .map_err(|e| PrescriptionError::DatabaseError(format!("Failed to parse prescription: {}", e)))
    }

    pub async fn get_prescription(
        &self,
        user: &User,
        prescription_id: &str,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let prescription = self.fetch(prescription_id, auth_token).await?;
        if !Self::can_view(user, &prescription.patient_id) {
            return Err(PrescriptionError::Unauthorized);
        }
        Ok(prescription)
    }

    pub async fn list_for_patient(
        &self,
        user: &User,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        if !Self::can_view(user, patient_id) {
            return Err(PrescriptionError::Unauthorized);
        }

        let path = format!(
            "/rest/v1/prescriptions?patient_id=eq.{}&order=created_at.desc",
            urlencoding::encode(patient_id)
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Prescription>, _>>()
            .map_err(|e| PrescriptionError::DatabaseError(format!("Failed to parse prescriptions: {}", e)))
    }

    /// Removes the stored file, then the record. Only the uploader or an admin may delete.
    pub async fn delete_prescription(
        &self,
        user: &User,
        prescription_id: &str,
        auth_token: &str,
    ) -> Result<(), PrescriptionError> {
        let prescription = self.fetch(prescription_id, auth_token).await?;
        if prescription.uploaded_by != user.id && !user.is_admin() {
            return Err(PrescriptionError::Unauthorized);
        }

        self.supabase
            .delete_object(&prescription.storage_path, auth_token)
            .await
            .map_err(|e| PrescriptionError::StorageError(e.to_string()))?;

        let path = format!("/rest/v1/prescriptions?id=eq.{}", urlencoding::encode(&prescription.id));
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        info!("Prescription {} deleted by {}", prescription.id, user.id);
        Ok(())
    }

    pub async fn analyze_prescription(
        &self,
        user: &User,
        prescription_id: &str,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        let prescription = self.get_prescription(user, prescription_id, auth_token).await?;
        if !prescription.is_image() {
            return Err(PrescriptionError::NotAnImage);
        }

        let analyzer = self.analyzer.as_ref().ok_or(PrescriptionError::AnalysisUnavailable)?;
        let analysis = analyzer.analyze(&prescription.file_url).await?;

        let filter = format!("id=eq.{}", urlencoding::encode(&prescription.id));
        let updated: Prescription = self
            .supabase
            .patch_returning(
                "prescriptions",
                &filter,
                json!({
                    "analysis": analysis,
                    "analyzed_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await
            .map_err(|e| PrescriptionError::DatabaseError(e.to_string()))?;

        info!(
            "Prescription {} analyzed: {} medication(s)",
            updated.id,
            analysis.medications.len()
        );
        Ok(updated)
    }
}
