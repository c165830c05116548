pub mod email;
pub mod notifier;
pub mod sms;

pub use email::EmailService;
pub use notifier::NotificationService;
pub use sms::SmsService;
