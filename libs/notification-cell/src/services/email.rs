use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Client for an HTTP transactional email API (`POST {base}/emails`).
pub struct EmailService {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailService {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::NotConfigured("email"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.notification_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.email_api_url.trim_end_matches('/').to_string(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<Value, NotificationError> {
        debug!("Sending email '{}' to {}", subject, to);

        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Email provider error ({}): {}", status, message);
            return Err(NotificationError::Provider { status: status.as_u16(), message });
        }

        Ok(response.json().await.unwrap_or(Value::Null))
    }
}
