use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{AppointmentError, VideoTokenResponse};

type HmacSha256 = Hmac<Sha256>;

/// Issues join tokens for the video SDK. A token is
/// `base64url(payload).base64url(hmac_sha256(server_secret, payload_segment))`.
pub struct VideoTokenService {
    app_id: String,
    server_secret: String,
    ttl: Duration,
}

impl VideoTokenService {
    pub fn new(config: &AppConfig) -> Result<Self, AppointmentError> {
        if !config.is_video_configured() {
            return Err(AppointmentError::VideoServiceUnavailable);
        }

        Ok(Self {
            app_id: config.video_app_id.clone(),
            server_secret: config.video_server_secret.clone(),
            ttl: Duration::seconds(config.video_token_ttl_secs.max(60)),
        })
    }

    pub fn room_id_for(appointment_id: &str) -> String {
        format!("carepulse-{}", appointment_id)
    }

    pub fn issue(&self, user_id: &str, room_id: &str) -> Result<VideoTokenResponse, AppointmentError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let payload = json!({
            "app_id": self.app_id,
            "room_id": room_id,
            "user_id": user_id,
            "nonce": Uuid::new_v4().to_string(),
            "iat": now.timestamp(),
            "exp": expires_at.timestamp()
        });
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let mut mac = HmacSha256::new_from_slice(self.server_secret.as_bytes())
            .map_err(|_| AppointmentError::VideoServiceUnavailable)?;
        mac.update(payload_encoded.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        debug!("Issued video token for user {} in room {}", user_id, room_id);

        Ok(VideoTokenResponse {
            app_id: self.app_id.clone(),
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            token: format!("{}.{}", payload_encoded, signature),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::TestConfig;

    #[test]
    fn token_signature_verifies_with_server_secret() {
        let config = TestConfig::default().to_app_config();
        let service = VideoTokenService::new(&config).unwrap();

        let issued = service.issue("user-1", "carepulse-a1").unwrap();
        let (payload, signature) = issued.token.split_once('.').unwrap();

        let mut mac = HmacSha256::new_from_slice(config.video_server_secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        let expected = general_purpose::URL_SAFE_NO_PAD.decode(signature).unwrap();
        assert!(mac.verify_slice(&expected).is_ok());

        let claims: serde_json::Value =
            serde_json::from_slice(&general_purpose::URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(claims["room_id"], "carepulse-a1");
        assert_eq!(claims["user_id"], "user-1");
        assert_eq!(claims["exp"].as_i64(), Some(issued.expires_at.timestamp()));
    }

    #[test]
    fn unconfigured_video_is_unavailable() {
        let mut config = TestConfig::default().to_app_config();
        config.video_server_secret.clear();
        assert_matches!(
            VideoTokenService::new(&config).err(),
            Some(AppointmentError::VideoServiceUnavailable)
        );
    }

    #[test]
    fn room_ids_are_derived_from_appointment() {
        assert_eq!(VideoTokenService::room_id_for("abc"), "carepulse-abc");
    }
}
