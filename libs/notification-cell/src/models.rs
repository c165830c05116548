use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{0} channel is not configured")]
    NotConfigured(&'static str),

    #[error("Provider rejected the message ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// What the appointment cell knows about a booking when it notifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentNotice {
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    /// Titled, e.g. "Dr. Leila Cameron".
    pub doctor_name: String,
    pub schedule: DateTime<Utc>,
    pub reason: Option<String>,
}

impl AppointmentNotice {
    pub fn formatted_schedule(&self) -> String {
        self.schedule.format("%A, %B %-d %Y at %H:%M UTC").to_string()
    }
}

/// Result of a best-effort fan-out. Failures are recorded, never raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationOutcome {
    pub email_sent: bool,
    pub sms_sent: bool,
    pub errors: Vec<String>,
}
