use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use shared_ai::{ChatMessage, OpenAiClient};

use crate::models::ConsultationMessage;

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize conversations between a patient and an AI health assistant \
for the patient's care team. Write a short clinical summary covering the reported symptoms, their duration, \
relevant history, advice given and any red flags that need a doctor's attention. Do not add a diagnosis \
that was not discussed.";

/// Flattens a transcript into `role: content` lines for the summary prompt.
pub fn transcript_text(messages: &[ConsultationMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ConsultationSummarizer<'a> {
    ai: Option<&'a OpenAiClient>,
    limit: Duration,
}

impl<'a> ConsultationSummarizer<'a> {
    pub fn new(ai: Option<&'a OpenAiClient>, limit: Duration) -> Self {
        Self { ai, limit }
    }

    /// Requests a summary, giving up after the configured limit. The error
    /// side carries a message suitable for `summary_error`.
    pub async fn summarize(&self, messages: &[ConsultationMessage]) -> Result<String, String> {
        let ai = self
            .ai
            .ok_or_else(|| "AI summary is not configured".to_string())?;

        let prompt = [
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(transcript_text(messages)),
        ];

        debug!("Requesting consultation summary ({} messages)", messages.len());

        match timeout(self.limit, ai.chat(&prompt, None, 0.3)).await {
            Ok(Ok(summary)) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            Ok(Ok(_)) => Err("AI returned an empty summary".to_string()),
            Ok(Err(e)) => {
                warn!("Consultation summary failed: {}", e);
                Err(format!("Summary failed: {}", e))
            }
            Err(_) => {
                warn!("Consultation summary timed out after {:?}", self.limit);
                Err(format!("Summary timed out after {} seconds", self.limit.as_secs()))
            }
        }
    }
}
