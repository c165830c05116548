use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, ConflictKind, SlotRequest, MAX_DURATION_MINUTES,
};

/// Double-booking detection. Three sequential lookups with no lock or
/// transaction, so two concurrent bookings can both pass.
pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Returns the first conflict found, checking the doctor's calendar, then
    /// the patient's, then the one-visit-per-doctor-per-day rule.
    pub async fn find_conflict(
        &self,
        slot: &SlotRequest<'_>,
        auth_token: &str,
    ) -> Result<Option<ConflictKind>, AppointmentError> {
        let start = slot.start;
        let end = slot.end();
        debug!(
            "Checking conflicts for doctor {} / patient {} from {} to {}",
            slot.doctor_id, slot.patient_id, start, end
        );

        let doctor_filter = format!("doctor_id=eq.{}", urlencoding::encode(slot.doctor_id));
        let doctor_appointments = self
            .active_appointments_near(&doctor_filter, start, end, slot.exclude_appointment_id, auth_token)
            .await?;
        if doctor_appointments
            .iter()
            .any(|apt| appointments_overlap(start, end, apt.schedule, apt.end_time()))
        {
            warn!("Doctor {} is already booked at {}", slot.doctor_id, start);
            return Ok(Some(ConflictKind::DoctorUnavailable));
        }

        let patient_filter = format!("patient_id=eq.{}", urlencoding::encode(slot.patient_id));
        let patient_appointments = self
            .active_appointments_near(&patient_filter, start, end, slot.exclude_appointment_id, auth_token)
            .await?;
        if patient_appointments
            .iter()
            .any(|apt| appointments_overlap(start, end, apt.schedule, apt.end_time()))
        {
            warn!("Patient {} already has an appointment at {}", slot.patient_id, start);
            return Ok(Some(ConflictKind::PatientOverlap));
        }

        let (day_start, day_end) = day_bounds(start);
        let same_day_filter = format!(
            "patient_id=eq.{}&doctor_id=eq.{}",
            urlencoding::encode(slot.patient_id),
            urlencoding::encode(slot.doctor_id)
        );
        let same_day = self
            .active_appointments_between(&same_day_filter, day_start, day_end, slot.exclude_appointment_id, auth_token)
            .await?;
        if !same_day.is_empty() {
            warn!(
                "Patient {} already sees doctor {} on {}",
                slot.patient_id,
                slot.doctor_id,
                start.date_naive()
            );
            return Ok(Some(ConflictKind::SameDoctorSameDay));
        }

        Ok(None)
    }

    /// Active appointments that could overlap `[start, end)`: anything starting
    /// before `end` and no earlier than the longest allowed visit before `start`.
    async fn active_appointments_near(
        &self,
        filter: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let earliest = start - Duration::minutes(MAX_DURATION_MINUTES as i64);
        self.active_appointments_between(filter, earliest, end, exclude_appointment_id, auth_token)
            .await
    }

    async fn active_appointments_between(
        &self,
        filter: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_appointment_id: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            filter.to_string(),
            active_status_filter(),
            format!("schedule=gte.{}", encode_time(from)),
            format!("schedule=lt.{}", encode_time(until)),
        ];
        if let Some(id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", urlencoding::encode(id)));
        }

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
}

/// Half-open interval overlap: back-to-back appointments do not collide.
pub fn appointments_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

/// UTC midnight of the given instant's day and of the following day.
pub fn day_bounds(instant: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day_start = instant
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(instant);
    (day_start, day_start + Duration::days(1))
}

/// PostgREST filter matching every status that holds a slot.
fn active_status_filter() -> String {
    let active: Vec<String> = AppointmentStatus::ALL
        .iter()
        .filter(|status| status.is_active())
        .map(|status| status.to_string())
        .collect();
    format!("status=in.({})", active.join(","))
}

fn encode_time(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}
