use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::{normalize_email, validate_email, validate_length, validate_phone};

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, DoctorListQuery, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn validate_profile(request: &CreateDoctorRequest) -> Result<(), DoctorError> {
        validate_length("name", &request.name, 2, 50)?;
        validate_email(&request.email)?;
        validate_length("specialization", &request.specialization, 2, 100)?;
        if let Some(phone) = &request.phone {
            validate_phone(phone)?;
        }
        if matches!(request.experience_years, Some(years) if years < 0) {
            return Err(DoctorError::InvalidProfile(
                "experience_years cannot be negative".to_string(),
            ));
        }
        if matches!(request.consultation_fee, Some(fee) if fee < 0.0) {
            return Err(DoctorError::InvalidProfile(
                "consultation_fee cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a doctor profile. Doctors register themselves (id = their user
    /// id); admins may create a profile for any account id.
    pub async fn create_doctor(
        &self,
        caller: &User,
        mut request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        request.email = normalize_email(&request.email);
        let doctor_id = if caller.is_admin() {
            request.id.clone().unwrap_or_else(|| caller.id.clone())
        } else if caller.is_doctor() {
            caller.id.clone()
        } else {
            return Err(DoctorError::UnauthorizedAccess);
        };

        debug!("Creating doctor profile {} for {}", doctor_id, request.email);
        Self::validate_profile(&request)?;

        if self.find_doctor(&doctor_id, Some(auth_token)).await?.is_some() {
            return Err(DoctorError::AlreadyRegistered);
        }

        let existing_check_path = format!(
            "/rest/v1/doctors?email=eq.{}&select=id",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_check_path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(DoctorError::EmailAlreadyExists { email: request.email });
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": doctor_id,
            "name": request.name.trim(),
            "email": request.email,
            "phone": request.phone,
            "specialization": request.specialization.trim(),
            "qualification": request.qualification,
            "experience_years": request.experience_years,
            "bio": request.bio,
            "image_url": request.image_url,
            "consultation_fee": request.consultation_fee,
            "is_available": request.is_available,
            "created_at": now,
            "updated_at": now
        });

        let doctor: Doctor = self
            .supabase
            .insert_returning("doctors", doctor_data, auth_token)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        info!("Doctor profile created: {}", doctor.id);
        Ok(doctor)
    }

    /// Looks a doctor up. `auth_token` is optional so public listings can use
    /// the anon key alone.
    pub async fn find_doctor(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", urlencoding::encode(doctor_id));
        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let doctor = serde_json::from_value(result.swap_remove(0))
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
        Ok(Some(doctor))
    }

    pub async fn get_doctor(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        self.find_doctor(doctor_id, auth_token)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn list_doctors(
        &self,
        query: DoctorListQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors with filters: {:?}", query);

        let mut query_parts = vec![];
        if let Some(specialization) = query.specialization.as_deref().filter(|s| !s.is_empty()) {
            query_parts.push(format!(
                "specialization=ilike.*{}*",
                urlencoding::encode(specialization)
            ));
        }
        if query.available_only.unwrap_or(false) {
            query_parts.push("is_available=eq.true".to_string());
        }
        query_parts.push("order=name.asc".to_string());

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctors: {}", e)))
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        if let Some(name) = &request.name {
            validate_length("name", name, 2, 50)?;
        }
        if let Some(phone) = &request.phone {
            validate_phone(phone)?;
        }
        if let Some(specialization) = &request.specialization {
            validate_length("specialization", specialization, 2, 100)?;
        }

        let mut update_data = match serde_json::to_value(&request) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        update_data.retain(|_, value| !value.is_null());

        if update_data.is_empty() {
            warn!("Empty update for doctor {}", doctor_id);
            return self.get_doctor(doctor_id, Some(auth_token)).await;
        }

        self.patch_doctor(doctor_id, update_data, auth_token).await
    }

    pub async fn set_availability(
        &self,
        doctor_id: &str,
        is_available: bool,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let mut update_data = Map::new();
        update_data.insert("is_available".to_string(), json!(is_available));

        let doctor = self.patch_doctor(doctor_id, update_data, auth_token).await?;
        info!("Doctor {} availability set to {}", doctor_id, is_available);
        Ok(doctor)
    }

    async fn patch_doctor(
        &self,
        doctor_id: &str,
        mut update_data: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", urlencoding::encode(doctor_id));
        self.supabase
            .patch_returning("doctors", &filter, Value::Object(update_data), auth_token)
            .await
            .map_err(|e| {
                if e.to_string().starts_with("Resource not found") {
                    DoctorError::NotFound
                } else {
                    DoctorError::DatabaseError(e.to_string())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> CreateDoctorRequest {
        CreateDoctorRequest {
            id: None,
            name: "Adam Smith".to_string(),
            email: "adam@example.com".to_string(),
            phone: Some("+14155550100".to_string()),
            specialization: "Cardiology".to_string(),
            qualification: Some("MD".to_string()),
            experience_years: Some(12),
            bio: None,
            image_url: None,
            consultation_fee: Some(120.0),
            is_available: true,
        }
    }

    #[test]
    fn valid_profile_passes() {
        assert!(DoctorService::validate_profile(&request()).is_ok());
    }

    #[test]
    fn negative_numbers_are_rejected() {
        let mut r = request();
        r.experience_years = Some(-1);
        assert_matches!(DoctorService::validate_profile(&r), Err(DoctorError::InvalidProfile(_)));

        let mut r = request();
        r.consultation_fee = Some(-5.0);
        assert_matches!(DoctorService::validate_profile(&r), Err(DoctorError::InvalidProfile(_)));
    }

    #[test]
    fn bad_email_is_rejected() {
        let mut r = request();
        r.email = "not-an-email".to_string();
        assert_matches!(DoctorService::validate_profile(&r), Err(DoctorError::Validation(_)));
    }
}
