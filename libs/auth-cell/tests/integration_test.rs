use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::auth_routes;
use shared_config::AppConfig;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    auth_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("test@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    assert_eq!(json_response["valid"], true);
    assert_eq!(json_response["user_id"], user.id);
    assert_eq!(json_response["role"], user.role);
}

#[tokio::test]
async fn test_validate_token_endpoint_unauthorized() {
    let app = create_test_app(TestConfig::default().to_app_config());

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_creates_patient_account() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "jane@example.com",
            "data": { "name": "Jane Doe", "phone": "+14155552671", "role": "patient" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::session_response("user-1", "jane@example.com")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(config.to_app_config())
        .oneshot(post_json(
            "/register",
            json!({
                "name": "Jane Doe",
                "email": "Jane@Example.com",
                "phone": "+14155552671",
                "password": "s3cretpass"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json_response = body_json(response).await;
    assert_eq!(json_response["user_id"], "user-1");
    assert_eq!(json_response["access_token"], "access-token");
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let app = create_test_app(TestConfig::default().to_app_config());

    let response = app
        .oneshot(post_json(
            "/register",
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": "+14155552671",
                "password": "password"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_existing_email_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "error_code": "user_already_exists",
            "msg": "User already registered"
        })))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config.to_app_config())
        .oneshot(post_json(
            "/register",
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": "+14155552671",
                "password": "s3cretpass"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_returns_session() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::session_response("user-1", "jane@example.com")),
        )
        .mount(&mock_server)
        .await;

    let response = create_test_app(config.to_app_config())
        .oneshot(post_json(
            "/login",
            json!({ "email": "jane@example.com", "password": "s3cretpass" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    assert_eq!(json_response["refresh_token"], "refresh-token");
    assert_eq!(json_response["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&mock_server)
        .await;

    let response = create_test_app(config.to_app_config())
        .oneshot(post_json(
            "/login",
            json!({ "email": "jane@example.com", "password": "wrong-pass1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config.to_app_config()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_profile_includes_patient_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::auth_user_response(&user.id, &user.email)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", user.id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&user.id, &user.email, "Jane Doe")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .uri("/profile")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config.to_app_config()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    assert_eq!(json_response["user_id"], user.id);
    assert_eq!(json_response["identity"]["email"], user.email);
    assert_eq!(json_response["patient"]["name"], "Jane Doe");
}

#[tokio::test]
async fn test_profile_identity_failure_is_external_error() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let user = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("Internal server error", "INTERNAL_ERROR"),
        ))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .uri("/profile")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config.to_app_config()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_admin_passkey_issues_admin_token() {
    let config = TestConfig::default().to_app_config();
    let app = create_test_app(config.clone());

    let response = app
        .oneshot(post_json("/admin/passkey", json!({ "passkey": "123456" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    let token = json_response["access_token"].as_str().unwrap();
    let admin = validate_token(token, &config.supabase_jwt_secret).unwrap();
    assert!(admin.is_admin());
}

#[tokio::test]
async fn test_admin_passkey_mismatch_and_unconfigured() {
    let mut config = TestConfig::default().to_app_config();

    let response = create_test_app(config.clone())
        .oneshot(post_json("/admin/passkey", json!({ "passkey": "654321" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    config.admin_passkey = String::new();
    let response = create_test_app(config)
        .oneshot(post_json("/admin/passkey", json!({ "passkey": "123456" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
