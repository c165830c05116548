use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_ai::{ChatMessage, OpenAiClient, RealtimeSession};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::validation::validate_length;

use crate::models::{
    Consultation, ConsultationError, ConsultationMessage, ConsultationMode, ConsultationStatus,
    MessageExchange, StartConsultationRequest, TranscriptEntry, MAX_MESSAGE_CHARS,
};
use crate::services::lifecycle::ConsultationLifecycleService;
use crate::services::summary::ConsultationSummarizer;

const TABLE: &str = "ai_consultations";

pub const ASSISTANT_INSTRUCTIONS: &str = "You are CarePulse, a friendly health assistant talking with a patient \
before or between doctor visits. Ask one question at a time about symptoms, duration, severity and relevant \
history. Give general self-care guidance only. You are not a doctor: never prescribe medication or give a \
diagnosis, and tell the patient to seek emergency care for chest pain, difficulty breathing, signs of stroke \
or thoughts of self-harm.";

pub struct ConsultationService {
    supabase: SupabaseClient,
    ai: Option<OpenAiClient>,
    lifecycle: ConsultationLifecycleService,
    summary_timeout: Duration,
}

impl ConsultationService {
    pub fn new(config: &AppConfig) -> Self {
        let ai = match OpenAiClient::new(config) {
            Ok(ai) => Some(ai),
            Err(e) => {
                debug!("AI consultation disabled: {}", e);
                None
            }
        };

        Self {
            supabase: SupabaseClient::new(config),
            ai,
            lifecycle: ConsultationLifecycleService::new(),
            summary_timeout: Duration::from_secs(config.summary_timeout_secs),
        }
    }

    fn ai(&self) -> Result<&OpenAiClient, ConsultationError> {
        self.ai.as_ref().ok_or(ConsultationError::AiUnavailable)
    }

    fn can_access(user: &User, patient_id: &str) -> bool {
        user.id == patient_id || user.is_admin()
    }

    pub async fn start_consultation(
        &self,
        user: &User,
        request: StartConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let patient_id = request.patient_id.unwrap_or_else(|| user.id.clone());
        if !Self::can_access(user, &patient_id) {
            return Err(ConsultationError::Unauthorized);
        }

        let record = json!({
            "patient_id": patient_id,
            "appointment_id": request.appointment_id,
            "mode": request.mode,
            "status": ConsultationStatus::Active,
            "messages": [],
            "summary": null,
            "summary_error": null,
            "started_at": Utc::now().to_rfc3339(),
            "ended_at": null
        });

        let consultation: Consultation = self
            .supabase
            .insert_returning(TABLE, record, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        info!(
            "Started {} consultation {} for patient {}",
            consultation.mode, consultation.id, consultation.patient_id
        );
        Ok(consultation)
    }

    async fn fetch(&self, consultation_id: &str, auth_token: &str) -> Result<Consultation, ConsultationError> {
        let path = format!("/rest/v1/{}?id=eq.{}", TABLE, urlencoding::encode(consultation_id));
        let mut result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultationError::NotFound);
        }

        serde_json::from_value(result.swap_remove(0))
            .map_err(|e| ConsultationError::DatabaseError(format!("Failed to parse consultation: {}", e)))
    }

    pub async fn get_consultation(
        &self,
        user: &User,
        consultation_id: &str,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.fetch(consultation_id, auth_token).await?;
        if !Self::can_access(user, &consultation.patient_id) {
            return Err(ConsultationError::Unauthorized);
        }
        Ok(consultation)
    }

    pub async fn list_for_patient(
        &self,
        user: &User,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        if !Self::can_access(user, patient_id) {
            return Err(ConsultationError::Unauthorized);
        }

        let path = format!(
            "/rest/v1/{}?patient_id=eq.{}&order=started_at.desc",
            TABLE,
            urlencoding::encode(patient_id)
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Consultation>, _>>()
            .map_err(|e| ConsultationError::DatabaseError(format!("Failed to parse consultations: {}", e)))
    }

    async fn patch(
        &self,
        consultation_id: &str,
        changes: Value,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let filter = format!("id=eq.{}", urlencoding::encode(consultation_id));
        self.supabase
            .patch_returning(TABLE, &filter, changes, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))
    }

    /// Appends the patient's message, asks the chat model for a reply with the
    /// whole history as context and stores both.
    pub async fn send_message(
        &self,
        user: &User,
        consultation_id: &str,
        content: &str,
        auth_token: &str,
    ) -> Result<MessageExchange, ConsultationError> {
        validate_length("content", content, 1, MAX_MESSAGE_CHARS)?;

        let mut consultation = self.get_consultation(user, consultation_id, auth_token).await?;
        consultation.ensure_mode(ConsultationMode::Text)?;
        consultation.ensure_active()?;
        let ai = self.ai()?;

        consultation
            .messages
            .push(ConsultationMessage::new("user", content.trim()));

        let mut prompt = Vec::with_capacity(consultation.messages.len() + 1);
        prompt.push(ChatMessage::system(ASSISTANT_INSTRUCTIONS));
        prompt.extend(consultation.messages.iter().map(|m| match m.role.as_str() {
            "assistant" => ChatMessage::assistant(m.content.clone()),
            _ => ChatMessage::user(m.content.clone()),
        }));

        let reply_text = ai.chat(&prompt, None, 0.7).await?;
        let reply = ConsultationMessage::new("assistant", reply_text.trim());
        consultation.messages.push(reply.clone());

        let updated = self
            .patch(&consultation.id, json!({ "messages": consultation.messages }), auth_token)
            .await?;

        debug!("Consultation {} now has {} messages", updated.id, updated.messages.len());
        Ok(MessageExchange {
            reply,
            consultation: updated,
        })
    }

    /// Proxies the browser's SDP offer to the realtime API.
    pub async fn realtime_sdp(
        &self,
        user: &User,
        consultation_id: &str,
        offer_sdp: &str,
        auth_token: &str,
    ) -> Result<String, ConsultationError> {
        if offer_sdp.trim().is_empty() {
            return Err(ConsultationError::InvalidRequest("SDP offer is empty".to_string()));
        }

        let consultation = self.get_consultation(user, consultation_id, auth_token).await?;
        consultation.ensure_mode(ConsultationMode::Voice)?;
        consultation.ensure_active()?;

        let answer = self.ai()?.realtime_sdp_exchange(offer_sdp).await?;
        info!("Voice session negotiated for consultation {}", consultation.id);
        Ok(answer)
    }

    pub async fn realtime_session(
        &self,
        user: &User,
        consultation_id: &str,
        auth_token: &str,
    ) -> Result<RealtimeSession, ConsultationError> {
        let consultation = self.get_consultation(user, consultation_id, auth_token).await?;
        consultation.ensure_mode(ConsultationMode::Voice)?;
        consultation.ensure_active()?;

        let session = self.ai()?.create_realtime_session(ASSISTANT_INSTRUCTIONS).await?;
        info!("Issued realtime session for consultation {}", consultation.id);
        Ok(session)
    }

    /// Stores transcript entries relayed from the voice data channel.
    pub async fn append_transcript(
        &self,
        user: &User,
        consultation_id: &str,
        entries: Vec<TranscriptEntry>,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        if entries.is_empty() {
            return Err(ConsultationError::InvalidRequest("entries must not be empty".to_string()));
        }
        for entry in &entries {
            if entry.role != "user" && entry.role != "assistant" {
                return Err(ConsultationError::InvalidRequest(format!(
                    "unknown transcript role '{}'",
                    entry.role
                )));
            }
            validate_length("content", &entry.content, 1, MAX_MESSAGE_CHARS)?;
        }

        let mut consultation = self.get_consultation(user, consultation_id, auth_token).await?;
        consultation.ensure_active()?;

        consultation.messages.extend(
            entries
                .into_iter()
                .map(|e| ConsultationMessage::new(&e.role, e.content.trim())),
        );

        self.patch(&consultation.id, json!({ "messages": consultation.messages }), auth_token)
            .await
    }

    /// Ends the consultation and stores a summary. Summary failures are
    /// recorded on the consultation rather than returned.
    pub async fn end_consultation(
        &self,
        user: &User,
        consultation_id: &str,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get_consultation(user, consultation_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(consultation.status, ConsultationStatus::Summarizing)?;

        let summarizing = self
            .patch(
                &consultation.id,
                json!({
                    "status": ConsultationStatus::Summarizing,
                    "ended_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        let changes = if summarizing.messages.is_empty() {
            debug!("Consultation {} ended without messages", summarizing.id);
            json!({ "status": ConsultationStatus::Completed })
        } else {
            let summarizer = ConsultationSummarizer::new(self.ai.as_ref(), self.summary_timeout);
            match summarizer.summarize(&summarizing.messages).await {
                Ok(summary) => json!({
                    "status": ConsultationStatus::Completed,
                    "summary": summary,
                    "summary_error": null
                }),
                Err(reason) => json!({
                    "status": ConsultationStatus::Completed,
                    "summary_error": reason
                }),
            }
        };

        self.lifecycle
            .validate_status_transition(summarizing.status, ConsultationStatus::Completed)?;

        match self.patch(&summarizing.id, changes, auth_token).await {
            Ok(completed) => {
                info!(
                    "Consultation {} completed (summary: {})",
                    completed.id,
                    completed.summary.is_some()
                );
                Ok(completed)
            }
            Err(e) => {
                error!("Failed to store outcome of consultation {}: {}", summarizing.id, e);
                let failed = json!({ "status": ConsultationStatus::Failed });
                if let Err(mark) = self.patch(&summarizing.id, failed, auth_token).await {
                    warn!("Could not mark consultation {} as failed: {}", summarizing.id, mark);
                }
                Err(e)
            }
        }
    }
}
