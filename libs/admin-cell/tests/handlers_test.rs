use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use admin_cell::admin_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn app_with(config: AppConfig) -> Router {
    admin_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn counted(total: u64) -> ResponseTemplate {
    ResponseTemplate::new(206)
        .insert_header("Content-Range", format!("0-0/{}", total).as_str())
        .set_body_json(json!([]))
}

async fn mount_count(server: &MockServer, table: &str, status: Option<&str>, total: u64) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("select", "id"));

    let mock = match status {
        Some(status) => mock.and(query_param("status", format!("eq.{}", status))),
        None => mock.and(query_param_is_missing("status")),
    };

    mock.respond_with(counted(total)).mount(server).await;
}

#[tokio::test]
async fn dashboard_reports_counts_and_recent_appointments() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    mount_count(&mock_server, "appointments", Some("scheduled"), 4).await;
    mount_count(&mock_server, "appointments", Some("pending"), 3).await;
    mount_count(&mock_server, "appointments", Some("cancelled"), 2).await;
    mount_count(&mock_server, "appointments", Some("completed"), 1).await;
    mount_count(&mock_server, "appointments", None, 10).await;
    mount_count(&mock_server, "patients", None, 7).await;
    mount_count(&mock_server, "doctors", None, 5).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("apt-2", "p-1", "d-1", "2026-02-01T10:00:00Z", "pending"),
            MockSupabaseResponses::appointment_response("apt-1", "p-2", "d-1", "2026-01-20T10:00:00Z", "scheduled")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(get("/dashboard?limit=2", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["scheduled_count"], 4);
    assert_eq!(json["pending_count"], 3);
    assert_eq!(json["cancelled_count"], 2);
    assert_eq!(json["completed_count"], 1);
    assert_eq!(json["total_count"], 10);
    assert_eq!(json["patient_count"], 7);
    assert_eq!(json["doctor_count"], 5);
    assert_eq!(json["recent_appointments"][0]["id"], "apt-2");
}

#[tokio::test]
async fn dashboard_requires_admin() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("leila@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let response = app_with(config.to_app_config())
        .oneshot(get("/dashboard", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn dashboard_without_token_is_unauthorized() {
    let config = TestConfig::default();

    let request = Request::builder().uri("/dashboard").body(Body::empty()).unwrap();
    let response = app_with(config.to_app_config()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_pages_through_appointments() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", "40"))
        .and(query_param_is_missing("patient_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("apt-9", "p-1", "d-1", "2026-02-01T10:00:00Z", "pending")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(get("/appointments?status=pending&limit=20&offset=40", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["offset"], 40);
    assert_eq!(json["appointments"][0]["status"], "pending");
}
