use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use appointment_cell::{AppointmentListQuery, AppointmentService};
use shared_config::AppConfig;
use shared_models::auth::{User, ROLE_ADMIN};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::DashboardQuery;
use crate::services::AdminDashboardService;

#[axum::debug_handler]
pub async fn get_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN])?;

    let service = AdminDashboardService::new(&config);
    let stats = service.dashboard(&query, auth.token()).await?;

    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_ADMIN])?;

    let limit = query.limit;
    let offset = query.offset;

    let service = AppointmentService::new(&config);
    let appointments = service
        .list_appointments(&user, query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
        "limit": limit,
        "offset": offset
    })))
}
