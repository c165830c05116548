use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Twilio Messages API client.
pub struct SmsService {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsService {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_sms_configured() {
            return Err(NotificationError::NotConfigured("sms"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.notification_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.twilio_api_base_url.trim_end_matches('/').to_string(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_from_number.clone(),
        })
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<Value, NotificationError> {
        debug!("Sending SMS to {}", to);

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("SMS provider error ({}): {}", status, message);
            return Err(NotificationError::Provider { status: status.as_u16(), message });
        }

        Ok(response.json().await.unwrap_or(Value::Null))
    }
}
