use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use doctor_cell::DoctorService;
use notification_cell::{AppointmentNotice, NotificationService};
use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::validate_length;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CancelAppointmentRequest, ConflictCheckQuery, ConflictCheckResponse,
    CreateAppointmentRequest, ScheduleAppointmentRequest, SlotRequest, VideoTokenResponse,
    DEFAULT_DURATION_MINUTES, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::video::VideoTokenService;

pub struct AppointmentService {
    supabase: Arc<SupabaseClient>,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    doctors: DoctorService,
    patients: PatientService,
    notifier: NotificationService,
    video: Option<VideoTokenService>,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflicts: ConflictDetectionService::new(Arc::clone(&supabase)),
            supabase,
            lifecycle: AppointmentLifecycleService::new(),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            notifier: NotificationService::new(config),
            video: VideoTokenService::new(config).ok(),
        }
    }

    fn resolve_duration(duration_minutes: Option<i32>) -> Result<i32, AppointmentError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
            return Err(AppointmentError::InvalidTime(format!(
                "duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        Ok(duration)
    }

    fn ensure_future(schedule: chrono::DateTime<Utc>) -> Result<(), AppointmentError> {
        if schedule <= Utc::now() {
            return Err(AppointmentError::InvalidTime(
                "appointment must be scheduled in the future".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_doctor_available(&self, doctor_id: &str, auth_token: &str) -> Result<(), AppointmentError> {
        let doctor = self.doctors.get_doctor(doctor_id, Some(auth_token)).await?;
        if !doctor.is_available {
            return Err(AppointmentError::DoctorNotAvailable);
        }
        Ok(())
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    pub async fn create_appointment(
        &self,
        user: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = if user.is_admin() {
            request.patient_id.clone().ok_or_else(|| {
                AppointmentError::InvalidRequest("patient_id is required when booking for a patient".to_string())
            })?
        } else if user.is_patient() {
            if matches!(&request.patient_id, Some(id) if *id != user.id) {
                return Err(AppointmentError::Unauthorized);
            }
            user.id.clone()
        } else {
            return Err(AppointmentError::Unauthorized);
        };

        debug!("Booking appointment for patient {} with doctor {}", patient_id, request.doctor_id);

        validate_length("reason", &request.reason, 2, 500)?;
        Self::ensure_future(request.schedule)?;
        let duration = Self::resolve_duration(request.duration_minutes)?;

        self.patients.get_patient(&patient_id, auth_token).await?;
        self.ensure_doctor_available(&request.doctor_id, auth_token).await?;

        let slot = SlotRequest {
            doctor_id: &request.doctor_id,
            patient_id: &patient_id,
            start: request.schedule,
            duration_minutes: duration,
            exclude_appointment_id: None,
        };
        if let Some(conflict) = self.conflicts.find_conflict(&slot, auth_token).await? {
            return Err(AppointmentError::Conflict(conflict));
        }

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "schedule": request.schedule.to_rfc3339(),
            "duration_minutes": duration,
            "reason": request.reason.trim(),
            "note": request.note,
            "status": AppointmentStatus::Pending,
            "cancellation_reason": null,
            "video_room_id": null,
            "created_at": now,
            "updated_at": now
        });

        let appointment: Appointment = self
            .supabase
            .insert_returning("appointments", appointment_data, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} requested by patient {}", appointment.id, appointment.patient_id);

        if let Some(notice) = self.notice_for(&appointment, auth_token).await {
            self.notifier.notify_requested(&notice).await;
        }

        Ok(appointment)
    }

    pub async fn check_conflicts(
        &self,
        query: ConflictCheckQuery,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let duration = Self::resolve_duration(query.duration_minutes)?;
        let slot = SlotRequest {
            doctor_id: &query.doctor_id,
            patient_id: &query.patient_id,
            start: query.schedule,
            duration_minutes: duration,
            exclude_appointment_id: query.exclude_appointment_id.as_deref(),
        };

        let conflict = self.conflicts.find_conflict(&slot, auth_token).await?;
        Ok(ConflictCheckResponse::from(conflict))
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", urlencoding::encode(appointment_id));
        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result.swap_remove(0))
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Fetches an appointment the caller may see: its patient, its doctor or an admin.
    pub async fn get_appointment_for(
        &self,
        user: &User,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if !user.is_admin() && !appointment.is_participant(&user.id) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        user: &User,
        query: AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![];

        if user.is_admin() {
            // all appointments
        } else if user.is_doctor() {
            query_parts.push(format!("doctor_id=eq.{}", urlencoding::encode(&user.id)));
        } else {
            query_parts.push(format!("patient_id=eq.{}", urlencoding::encode(&user.id)));
        }

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);
        query_parts.push("order=schedule.desc".to_string());
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    // ==============================================================================
    // LIFECYCLE
    // ==============================================================================

    /// Admin confirmation of a pending request, optionally moving it to a new
    /// slot or doctor.
    pub async fn schedule_appointment(
        &self,
        user: &User,
        appointment_id: &str,
        request: ScheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if !user.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Scheduled)?;

        let schedule = match request.schedule {
            Some(schedule) => {
                Self::ensure_future(schedule)?;
                schedule
            }
            None => appointment.schedule,
        };
        let duration = Self::resolve_duration(request.duration_minutes.or(Some(appointment.duration_minutes)))?;
        let doctor_id = request.doctor_id.clone().unwrap_or_else(|| appointment.doctor_id.clone());

        if doctor_id != appointment.doctor_id {
            self.ensure_doctor_available(&doctor_id, auth_token).await?;
        }

        let slot = SlotRequest {
            doctor_id: &doctor_id,
            patient_id: &appointment.patient_id,
            start: schedule,
            duration_minutes: duration,
            exclude_appointment_id: Some(&appointment.id),
        };
        if let Some(conflict) = self.conflicts.find_conflict(&slot, auth_token).await? {
            return Err(AppointmentError::Conflict(conflict));
        }

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Scheduled));
        changes.insert("schedule".to_string(), json!(schedule.to_rfc3339()));
        changes.insert("duration_minutes".to_string(), json!(duration));
        changes.insert("doctor_id".to_string(), json!(doctor_id));
        changes.insert(
            "video_room_id".to_string(),
            json!(VideoTokenService::room_id_for(&appointment.id)),
        );

        let scheduled = self.patch_appointment(&appointment.id, changes, auth_token).await?;
        info!("Appointment {} scheduled for {}", scheduled.id, scheduled.schedule);

        if let Some(notice) = self.notice_for(&scheduled, auth_token).await {
            self.notifier.notify_scheduled(&notice).await;
        }

        Ok(scheduled)
    }

    pub async fn cancel_appointment(
        &self,
        user: &User,
        appointment_id: &str,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        validate_length("reason", &request.reason, 2, 500)?;

        let appointment = self.get_appointment_for(user, appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let reason = request.reason.trim().to_string();
        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Cancelled));
        changes.insert("cancellation_reason".to_string(), json!(reason));

        let cancelled = self.patch_appointment(&appointment.id, changes, auth_token).await?;
        info!("Appointment {} cancelled by {}", cancelled.id, user.id);

        if let Some(notice) = self.notice_for(&cancelled, auth_token).await {
            self.notifier.notify_cancelled(&notice, &reason).await;
        }

        Ok(cancelled)
    }

    pub async fn complete_appointment(
        &self,
        user: &User,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if !user.is_admin() && appointment.doctor_id != user.id {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(AppointmentStatus::Completed));

        let completed = self.patch_appointment(&appointment.id, changes, auth_token).await?;
        info!("Appointment {} completed", completed.id);
        Ok(completed)
    }

    pub async fn video_token(
        &self,
        user: &User,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<VideoTokenResponse, AppointmentError> {
        let video = self.video.as_ref().ok_or(AppointmentError::VideoServiceUnavailable)?;

        let appointment = self.get_appointment_for(user, appointment_id, auth_token).await?;
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::VideoNotReady);
        }

        let room_id = appointment
            .video_room_id
            .clone()
            .unwrap_or_else(|| VideoTokenService::room_id_for(&appointment.id));

        video.issue(&user.id, &room_id)
    }

    async fn patch_appointment(
        &self,
        appointment_id: &str,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", urlencoding::encode(appointment_id));
        self.supabase
            .patch_returning("appointments", &filter, Value::Object(changes), auth_token)
            .await
            .map_err(|e| {
                if e.to_string().starts_with("Resource not found") {
                    AppointmentError::NotFound
                } else {
                    AppointmentError::DatabaseError(e.to_string())
                }
            })
    }

    /// Collects the contact details notifications need. Lookup failures only
    /// skip the notification.
    async fn notice_for(&self, appointment: &Appointment, auth_token: &str) -> Option<AppointmentNotice> {
        let patient = match self.patients.find_patient(&appointment.patient_id, auth_token).await {
            Ok(Some(patient)) => patient,
            Ok(None) => {
                warn!("No patient record for appointment {}, skipping notification", appointment.id);
                return None;
            }
            Err(e) => {
                warn!("Patient lookup for notification failed: {}", e);
                return None;
            }
        };

        let doctor = match self.doctors.find_doctor(&appointment.doctor_id, Some(auth_token)).await {
            Ok(Some(doctor)) => doctor,
            Ok(None) => {
                warn!("No doctor record for appointment {}, skipping notification", appointment.id);
                return None;
            }
            Err(e) => {
                warn!("Doctor lookup for notification failed: {}", e);
                return None;
            }
        };

        Some(AppointmentNotice {
            patient_name: patient.name,
            patient_email: Some(patient.email),
            patient_phone: Some(patient.phone),
            doctor_name: doctor.display_name(),
            schedule: appointment.schedule,
            reason: Some(appointment.reason.clone()),
        })
    }
}
