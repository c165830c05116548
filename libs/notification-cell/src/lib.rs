pub mod models;
pub mod services;

pub use models::{AppointmentNotice, NotificationError, NotificationOutcome};
pub use services::{EmailService, NotificationService, SmsService};
