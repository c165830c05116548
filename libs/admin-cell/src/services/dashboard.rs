use futures::future::try_join_all;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use appointment_cell::{Appointment, AppointmentStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AdminError, DashboardQuery, DashboardStats};

const STATUSES: [AppointmentStatus; 4] = [
    AppointmentStatus::Scheduled,
    AppointmentStatus::Pending,
    AppointmentStatus::Cancelled,
    AppointmentStatus::Completed,
];

pub struct AdminDashboardService {
    supabase: SupabaseClient,
}

impl AdminDashboardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn count(&self, table: &str, filter: &str, auth_token: &str) -> Result<u64, AdminError> {
        self.supabase
            .count(table, filter, auth_token)
            .await
            .map_err(|e| AdminError::DatabaseError(e.to_string()))
    }

    pub async fn recent_appointments(&self, limit: u32, auth_token: &str) -> Result<Vec<Appointment>, AdminError> {
        let path = format!("/rest/v1/appointments?order=created_at.desc&limit={}", limit);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AdminError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AdminError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    /// Status counts, head counts and the newest appointments, fetched concurrently.
    pub async fn dashboard(&self, query: &DashboardQuery, auth_token: &str) -> Result<DashboardStats, AdminError> {
        debug!("Building admin dashboard");

        let filters: Vec<String> = STATUSES.iter().map(|s| format!("status=eq.{}", s)).collect();
        let status_counts = try_join_all(
            filters
                .iter()
                .map(|filter| self.count("appointments", filter, auth_token)),
        );

        let (status_counts, total_count, patient_count, doctor_count, recent_appointments) = tokio::try_join!(
            status_counts,
            self.count("appointments", "", auth_token),
            self.count("patients", "", auth_token),
            self.count("doctors", "", auth_token),
            self.recent_appointments(query.recent_limit(), auth_token),
        )?;

        let stats = DashboardStats {
            scheduled_count: status_counts[0],
            pending_count: status_counts[1],
            cancelled_count: status_counts[2],
            completed_count: status_counts[3],
            total_count,
            patient_count,
            doctor_count,
            recent_appointments,
        };

        info!(
            "Dashboard: {} appointments ({} pending), {} patients, {} doctors",
            stats.total_count, stats.pending_count, stats.patient_count, stats.doctor_count
        );
        Ok(stats)
    }
}
