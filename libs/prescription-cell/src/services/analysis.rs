use tracing::{debug, warn};

use shared_ai::{ChatMessage, OpenAiClient};

use crate::models::{PrescriptionAnalysis, PrescriptionError};

const ANALYSIS_SYSTEM_PROMPT: &str = "You read photographed or scanned medical prescriptions. \
Respond with a single JSON object of the form \
{\"medications\": [{\"name\": string, \"dosage\": string|null, \"frequency\": string|null, \"duration\": string|null}], \
\"instructions\": string|null, \"warnings\": [string], \"confidence\": number between 0 and 1}. \
Only report what is legible. Never invent medications.";

const ANALYSIS_USER_PROMPT: &str = "Extract the medications and instructions from this prescription.";

/// Vision-model reader for prescription images.
pub struct PrescriptionAnalyzer {
    ai: OpenAiClient,
}

impl PrescriptionAnalyzer {
    pub fn new(ai: OpenAiClient) -> Self {
        Self { ai }
    }

    pub async fn analyze(&self, image_url: &str) -> Result<PrescriptionAnalysis, PrescriptionError> {
        debug!("Analyzing prescription image {}", image_url);

        let messages = [
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user_with_image(ANALYSIS_USER_PROMPT, image_url),
        ];

        let raw = self.ai.chat_json(&messages, Some(self.ai.vision_model())).await?;
        parse_analysis(raw)
    }
}

pub fn parse_analysis(raw: serde_json::Value) -> Result<PrescriptionAnalysis, PrescriptionError> {
    let mut analysis: PrescriptionAnalysis = serde_json::from_value(raw).map_err(|e| {
        warn!("Vision model returned an unexpected shape: {}", e);
        PrescriptionError::AnalysisFailed(format!("unexpected analysis format: {}", e))
    })?;

    analysis.medications.retain(|m| !m.name.trim().is_empty());
    analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
    Ok(analysis)
}
