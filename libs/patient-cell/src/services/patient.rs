use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::{
    decode_upload, extension_for, normalize_email, validate_email, validate_length, validate_phone,
};

use crate::models::{
    IdentificationUpload, Patient, PatientError, PatientSearchQuery, RegisterPatientRequest,
    UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn validate_registration(request: &RegisterPatientRequest) -> Result<(), PatientError> {
        validate_length("name", &request.name, 2, 50)?;
        validate_email(&request.email)?;
        validate_phone(&request.phone)?;
        validate_length("address", &request.address, 5, 500)?;
        validate_length("occupation", &request.occupation, 2, 500)?;
        validate_length("emergency_contact_name", &request.emergency_contact_name, 2, 50)?;
        validate_phone(&request.emergency_contact_number)?;

        if request.birth_date >= Utc::now().date_naive() {
            return Err(PatientError::InvalidDateOfBirth);
        }

        if !request.treatment_consent {
            return Err(PatientError::ConsentMissing("Consent to treatment"));
        }
        if !request.disclosure_consent {
            return Err(PatientError::ConsentMissing("Consent to health information disclosure"));
        }
        if !request.privacy_consent {
            return Err(PatientError::ConsentMissing("Acknowledgement of the privacy policy"));
        }

        Ok(())
    }

    /// Registers the calling user as a patient. The patient id is the user id.
    pub async fn register_patient(
        &self,
        user: &User,
        mut request: RegisterPatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Registering patient profile for user {}", user.id);
        request.email = normalize_email(&request.email);

        Self::validate_registration(&request)?;

        if self.find_patient(&user.id, auth_token).await?.is_some() {
            return Err(PatientError::AlreadyRegistered);
        }

        let existing_check_path = format!(
            "/rest/v1/patients?email=eq.{}&select=id",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PatientError::EmailAlreadyExists { email: request.email });
        }

        let identification_document_url = match &request.identification_document {
            Some(upload) => Some(self.upload_identification(&user.id, upload, auth_token).await?),
            None => None,
        };

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "id": user.id,
            "name": request.name.trim(),
            "email": request.email,
            "phone": request.phone.trim(),
            "birth_date": request.birth_date.format("%Y-%m-%d").to_string(),
            "gender": request.gender,
            "address": request.address,
            "occupation": request.occupation,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_number": request.emergency_contact_number,
            "primary_physician": request.primary_physician,
            "insurance_provider": request.insurance_provider,
            "insurance_policy_number": request.insurance_policy_number,
            "allergies": request.allergies,
            "current_medication": request.current_medication,
            "family_medical_history": request.family_medical_history,
            "past_medical_history": request.past_medical_history,
            "identification_type": request.identification_type,
            "identification_number": request.identification_number,
            "identification_document_url": identification_document_url,
            "treatment_consent": request.treatment_consent,
            "disclosure_consent": request.disclosure_consent,
            "privacy_consent": request.privacy_consent,
            "created_at": now,
            "updated_at": now
        });

        let patient: Patient = self
            .supabase
            .insert_returning("patients", patient_data, auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient profile created for user {}", patient.id);
        Ok(patient)
    }

    async fn upload_identification(
        &self,
        user_id: &str,
        upload: &IdentificationUpload,
        auth_token: &str,
    ) -> Result<String, PatientError> {
        let extension = extension_for(&upload.file_type)?;
        let bytes = decode_upload(&upload.file_data)?;

        let object_path = format!("identification/{}/{}.{}", user_id, Uuid::new_v4(), extension);
        debug!("Uploading identification document to {}", object_path);

        self.supabase
            .upload_object(&object_path, bytes, &upload.file_type, auth_token)
            .await
            .map_err(|e| PatientError::StorageError(e.to_string()))?;

        Ok(self.supabase.public_url(&object_path))
    }

    pub async fn find_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let patient = serde_json::from_value(result.swap_remove(0))
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))?;
        Ok(Some(patient))
    }

    pub async fn get_patient(&self, patient_id: &str, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        self.find_patient(patient_id, auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        if let Some(name) = &request.name {
            validate_length("name", name, 2, 50)?;
        }
        if let Some(phone) = &request.phone {
            validate_phone(phone)?;
        }
        if let Some(number) = &request.emergency_contact_number {
            validate_phone(number)?;
        }

        let mut update_data = match serde_json::to_value(&request) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        update_data.retain(|_, value| !value.is_null());

        if update_data.is_empty() {
            warn!("Empty update for patient {}", patient_id);
            return self.get_patient(patient_id, auth_token).await;
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", urlencoding::encode(patient_id));
        self.supabase
            .patch_returning("patients", &filter, Value::Object(update_data), auth_token)
            .await
            .map_err(|e| {
                if e.to_string().starts_with("Resource not found") {
                    PatientError::NotFound
                } else {
                    PatientError::DatabaseError(e.to_string())
                }
            })
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(name) = &query.name {
            query_parts.push(format!("name=ilike.*{}*", urlencoding::encode(name)));
        }
        if let Some(email) = &query.email {
            query_parts.push(format!("email=ilike.*{}*", urlencoding::encode(email)));
        }
        if let Some(phone) = &query.phone {
            query_parts.push(format!("phone=ilike.*{}*", urlencoding::encode(phone)));
        }

        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);
        query_parts.push("order=created_at.desc".to_string());
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patients: {}", e)))
    }
}
