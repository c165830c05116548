use serde::{Deserialize, Serialize};
use thiserror::Error;

use appointment_cell::Appointment;
use shared_models::error::AppError;

pub const DEFAULT_RECENT_LIMIT: u32 = 10;
pub const MAX_RECENT_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub limit: Option<u32>,
}

impl DashboardQuery {
    pub fn recent_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub scheduled_count: u64,
    pub pending_count: u64,
    pub cancelled_count: u64,
    pub completed_count: u64,
    pub total_count: u64,
    pub patient_count: u64,
    pub doctor_count: u64,
    pub recent_appointments: Vec<Appointment>,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
