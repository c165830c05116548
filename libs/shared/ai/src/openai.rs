use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("AI API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: Value::String(content.into()) }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: Value::String(content.into()) }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: Value::String(content.into()) }
    }

    /// A user turn carrying text plus an image, for vision models.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: json!([
                { "type": "text", "text": text.into() },
                { "type": "image_url", "image_url": { "url": image_url.into() } }
            ]),
        }
    }
}

/// Ephemeral credentials the browser uses to open its own realtime
/// connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSession {
    pub session_id: Option<String>,
    pub model: String,
    pub voice: String,
    pub client_secret: String,
    pub expires_at: Option<i64>,
}

pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    vision_model: String,
    realtime_model: String,
    realtime_voice: String,
}

impl OpenAiClient {
    pub fn new(config: &AppConfig) -> Result<Self, AiError> {
        if !config.is_ai_configured() {
            return Err(AiError::NotConfigured);
        }

        Ok(Self {
            http_client: Client::new(),
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.openai_chat_model.clone(),
            vision_model: config.openai_vision_model.clone(),
            realtime_model: config.openai_realtime_model.clone(),
            realtime_voice: config.openai_realtime_voice.clone(),
        })
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Calling OpenAI endpoint {}", url);

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("OpenAI API error ({}): {}", status, message);
            return Err(AiError::Api { status: status.as_u16(), message });
        }

        Ok(response.json().await?)
    }

    fn first_choice_text(response: &Value) -> Result<String, AiError> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AiError::InvalidResponse("missing choices[0].message.content".to_string()))
    }

    /// Runs a chat completion and returns the assistant text.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        temperature: f32,
    ) -> Result<String, AiError> {
        let body = json!({
            "model": model.unwrap_or(self.chat_model.as_str()),
            "messages": messages,
            "temperature": temperature
        });

        let response = self.post_json("/chat/completions", &body).await?;
        Self::first_choice_text(&response)
    }

    /// Runs a chat completion constrained to a JSON object and parses it.
    pub async fn chat_json(&self, messages: &[ChatMessage], model: Option<&str>) -> Result<Value, AiError> {
        let body = json!({
            "model": model.unwrap_or(self.chat_model.as_str()),
            "messages": messages,
            "temperature": 0.1,
            "response_format": { "type": "json_object" }
        });

        let response = self.post_json("/chat/completions", &body).await?;
        let text = Self::first_choice_text(&response)?;

        serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AiError::InvalidResponse(format!("content is not JSON: {}", e)))
    }

    /// Forwards a browser SDP offer to the realtime API and returns the SDP
    /// answer.
    pub async fn realtime_sdp_exchange(&self, offer_sdp: &str) -> Result<String, AiError> {
        if offer_sdp.trim().is_empty() {
            return Err(AiError::InvalidResponse("empty SDP offer".to_string()));
        }

        let url = format!("{}/realtime?model={}", self.base_url, self.realtime_model);
        info!("Exchanging SDP with realtime model {}", self.realtime_model);

        let response = self
            .http_client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await?;

        let status = response.status();
        let answer = response.text().await?;

        if !status.is_success() {
            error!("Realtime SDP exchange failed ({}): {}", status, answer);
            return Err(AiError::Api { status: status.as_u16(), message: answer });
        }

        if !answer.trim_start().starts_with("v=") {
            return Err(AiError::InvalidResponse("realtime API did not return an SDP answer".to_string()));
        }

        Ok(answer)
    }

    /// Mints an ephemeral realtime session configured with `instructions`.
    pub async fn create_realtime_session(&self, instructions: &str) -> Result<RealtimeSession, AiError> {
        let body = json!({
            "model": self.realtime_model,
            "voice": self.realtime_voice,
            "instructions": instructions,
            "input_audio_transcription": { "model": "whisper-1" }
        });

        let response = self.post_json("/realtime/sessions", &body).await?;

        let client_secret = response["client_secret"]["value"]
            .as_str()
            .ok_or_else(|| AiError::InvalidResponse("missing client_secret.value".to_string()))?
            .to_string();

        Ok(RealtimeSession {
            session_id: response["id"].as_str().map(str::to_string),
            model: self.realtime_model.clone(),
            voice: self.realtime_voice.clone(),
            client_secret,
            expires_at: response["client_secret"]["expires_at"].as_i64(),
        })
    }
}

/// Models occasionally wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
