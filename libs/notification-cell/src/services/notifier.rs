use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{AppointmentNotice, NotificationError, NotificationOutcome};
use crate::services::{EmailService, SmsService};

/// Appointment notifications over every configured channel. Delivery is
/// best effort: failures are logged and returned in the outcome.
pub struct NotificationService {
    email: Option<EmailService>,
    sms: Option<SmsService>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let email = match EmailService::new(config) {
            Ok(service) => Some(service),
            Err(e) => {
                debug!("Email notifications disabled: {}", e);
                None
            }
        };

        let sms = match SmsService::new(config) {
            Ok(service) => Some(service),
            Err(e) => {
                debug!("SMS notifications disabled: {}", e);
                None
            }
        };

        Self { email, sms }
    }

    pub async fn notify_requested(&self, notice: &AppointmentNotice) -> NotificationOutcome {
        let subject = "We received your appointment request";
        let html = format!(
            "<p>Hi {},</p><p>Your appointment request with {} for {} has been received. \
             We will confirm it shortly.</p><p>Reason: {}</p>",
            escape_html(&notice.patient_name),
            escape_html(&notice.doctor_name),
            notice.formatted_schedule(),
            escape_html(notice.reason.as_deref().unwrap_or("not provided")),
        );

        // Requests are confirmed by email only; the SMS goes out on scheduling.
        self.dispatch(notice, subject, &html, None).await
    }

    pub async fn notify_scheduled(&self, notice: &AppointmentNotice) -> NotificationOutcome {
        let subject = "Your appointment is confirmed";
        let html = format!(
            "<p>Hi {},</p><p>Your appointment with {} is confirmed for {}.</p>",
            escape_html(&notice.patient_name),
            escape_html(&notice.doctor_name),
            notice.formatted_schedule(),
        );
        let sms = format!(
            "Greetings from CarePulse. Your appointment is confirmed for {} with {}",
            notice.formatted_schedule(),
            notice.doctor_name,
        );

        self.dispatch(notice, subject, &html, Some(&sms)).await
    }

    pub async fn notify_cancelled(&self, notice: &AppointmentNotice, reason: &str) -> NotificationOutcome {
        let subject = "Your appointment was cancelled";
        let html = format!(
            "<p>Hi {},</p><p>We regret to inform you that your appointment with {} for {} \
             has been cancelled.</p><p>Reason: {}</p>",
            escape_html(&notice.patient_name),
            escape_html(&notice.doctor_name),
            notice.formatted_schedule(),
            escape_html(reason),
        );
        let sms = format!(
            "Greetings from CarePulse. We regret to inform that your appointment for {} is cancelled. Reason: {}",
            notice.formatted_schedule(),
            reason,
        );

        self.dispatch(notice, subject, &html, Some(&sms)).await
    }

    async fn dispatch(
        &self,
        notice: &AppointmentNotice,
        subject: &str,
        html: &str,
        sms_body: Option<&str>,
    ) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::default();

        if let (Some(email), Some(to)) = (&self.email, notice.patient_email.as_deref()) {
            match email.send(to, subject, html).await {
                Ok(_) => outcome.email_sent = true,
                Err(e) => record_failure(&mut outcome, "email", e),
            }
        }

        if let (Some(sms), Some(to), Some(body)) = (&self.sms, notice.patient_phone.as_deref(), sms_body) {
            match sms.send(to, body).await {
                Ok(_) => outcome.sms_sent = true,
                Err(e) => record_failure(&mut outcome, "sms", e),
            }
        }

        info!(
            "Notification '{}' dispatched (email: {}, sms: {})",
            subject, outcome.email_sent, outcome.sms_sent
        );
        outcome
    }
}

/// Entity-encodes user supplied text before it goes into an email body.
fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn record_failure(outcome: &mut NotificationOutcome, channel: &str, error: NotificationError) {
    warn!("{} notification failed: {}", channel, error);
    outcome.errors.push(format!("{}: {}", channel, error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_in_user_text_is_escaped() {
        assert_eq!(
            escape_html("<b>Tom & \"Jerry\"</b>'s"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;&#x27;s"
        );
        assert_eq!(escape_html("Persistent cough"), "Persistent cough");
    }
}
