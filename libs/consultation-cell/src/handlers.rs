use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{SendMessageRequest, StartConsultationRequest, TranscriptRequest};
use crate::services::consultation::ASSISTANT_INSTRUCTIONS;
use crate::services::ConsultationService;

#[axum::debug_handler]
pub async fn start_consultation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<StartConsultationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ConsultationService::new(&config);

    let consultation = service.start_consultation(&user, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!(consultation))))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let consultation = service.get_consultation(&user, &consultation_id, auth.token()).await?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn get_patient_consultations(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let consultations = service.list_for_patient(&user, &patient_id, auth.token()).await?;

    Ok(Json(json!({
        "consultations": consultations,
        "total": consultations.len()
    })))
}

#[axum::debug_handler]
pub async fn send_message(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let exchange = service
        .send_message(&user, &consultation_id, &request.content, auth.token())
        .await?;

    Ok(Json(json!(exchange)))
}

/// Body is the raw SDP offer; the answer is returned as `application/sdp`.
#[axum::debug_handler]
pub async fn realtime_sdp(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
    offer: String,
) -> Result<impl IntoResponse, AppError> {
    let service = ConsultationService::new(&config);

    let answer = service
        .realtime_sdp(&user, &consultation_id, &offer, auth.token())
        .await?;

    Ok(([(header::CONTENT_TYPE, "application/sdp")], answer))
}

#[axum::debug_handler]
pub async fn realtime_session(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let session = service
        .realtime_session(&user, &consultation_id, auth.token())
        .await?;

    Ok(Json(json!({
        "session_id": session.session_id,
        "model": session.model,
        "voice": session.voice,
        "client_secret": session.client_secret,
        "expires_at": session.expires_at,
        "instructions": ASSISTANT_INSTRUCTIONS
    })))
}

#[axum::debug_handler]
pub async fn append_transcript(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let consultation = service
        .append_transcript(&user, &consultation_id, request.entries, auth.token())
        .await?;

    Ok(Json(json!(consultation)))
}

#[axum::debug_handler]
pub async fn end_consultation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultation_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&config);

    let consultation = service
        .end_consultation(&user, &consultation_id, auth.token())
        .await?;

    Ok(Json(json!(consultation)))
}
