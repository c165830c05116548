use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_bucket: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_chat_model: String,
    pub openai_vision_model: String,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: String,
    pub summary_timeout_secs: u64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
    pub twilio_api_base_url: String,
    pub notification_timeout_secs: u64,
    pub video_app_id: String,
    pub video_server_secret: String,
    pub video_token_ttl_secs: i64,
    pub admin_passkey: String,
    pub server_port: u16,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            storage_bucket: with_default("SUPABASE_STORAGE_BUCKET", "carepulse-files"),
            openai_api_key: required("OPENAI_API_KEY"),
            openai_base_url: with_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_chat_model: with_default("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
            openai_vision_model: with_default("OPENAI_VISION_MODEL", "gpt-4o"),
            openai_realtime_model: with_default("OPENAI_REALTIME_MODEL", "gpt-4o-realtime-preview"),
            openai_realtime_voice: with_default("OPENAI_REALTIME_VOICE", "alloy"),
            summary_timeout_secs: parsed_or("CONSULTATION_SUMMARY_TIMEOUT_SECS", 30),
            email_api_url: required("EMAIL_API_URL"),
            email_api_key: required("EMAIL_API_KEY"),
            email_from: with_default("EMAIL_FROM", "CarePulse <noreply@carepulse.app>"),
            twilio_account_sid: required("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: required("TWILIO_AUTH_TOKEN"),
            twilio_from_number: required("TWILIO_FROM_NUMBER"),
            twilio_api_base_url: with_default("TWILIO_API_BASE_URL", "https://api.twilio.com"),
            notification_timeout_secs: parsed_or("NOTIFICATION_TIMEOUT_SECS", 10),
            video_app_id: required("VIDEO_APP_ID"),
            video_server_secret: required("VIDEO_SERVER_SECRET"),
            video_token_ttl_secs: parsed_or("VIDEO_TOKEN_TTL_SECS", 3600),
            admin_passkey: required("ADMIN_PASSKEY"),
            server_port: parsed_or("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.openai_api_key.is_empty() && !self.openai_base_url.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_from_number.is_empty()
    }

    pub fn is_video_configured(&self) -> bool {
        !self.video_app_id.is_empty() && !self.video_server_secret.is_empty()
    }
}
