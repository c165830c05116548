use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prescription_cell::prescription_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

// 1x1 transparent PNG
const PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

fn app_with(config: AppConfig) -> Router {
    prescription_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn prescription_row(id: &str, patient_id: &str, uploaded_by: &str, file_type: &str) -> Value {
    let extension = if file_type == "application/pdf" { "pdf" } else { "png" };
    json!({
        "id": id,
        "patient_id": patient_id,
        "appointment_id": null,
        "doctor_id": null,
        "uploaded_by": uploaded_by,
        "file_name": format!("scan.{}", extension),
        "file_type": file_type,
        "file_url": format!("http://storage.local/prescriptions/{}/{}.{}", patient_id, id, extension),
        "storage_path": format!("prescriptions/{}/{}.{}", patient_id, id, extension),
        "notes": null,
        "analysis": null,
        "analyzed_at": null,
        "created_at": "2026-01-10T09:00:00Z"
    })
}

#[tokio::test]
async fn patient_uploads_prescription_image() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/carepulse-files/prescriptions/.+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "stored" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .and(body_partial_json(json!({
            "patient_id": patient.id,
            "uploaded_by": patient.id,
            "file_type": "image/png"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            prescription_row("rx-1", &patient.id, &patient.id, "image/png")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "patient_id": patient.id,
                "file_name": "scan.png",
                "file_type": "image/png",
                "file_data": format!("data:image/png;base64,{}", PNG_BASE64)
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["id"], "rx-1");
}

/// Base64 of `groups * 3` zero bytes.
fn zero_file_base64(groups: usize) -> String {
    "A".repeat(groups * 4)
}

#[tokio::test]
async fn large_scans_within_the_file_limit_are_accepted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/carepulse-files/prescriptions/.+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "stored" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            prescription_row("rx-big", &patient.id, &patient.id, "image/png")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // About 4 MiB of file, well over axum's default body limit once encoded
    let response = app_with(config.to_app_config())
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "patient_id": patient.id,
                "file_name": "scan.png",
                "file_type": "image/png",
                "file_data": zero_file_base64(4 * 1024 * 1024 / 3)
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn files_over_five_mib_fail_validation() {
    let config = TestConfig::default();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let response = app_with(config.to_app_config())
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "patient_id": patient.id,
                "file_name": "scan.png",
                "file_type": "image/png",
                "file_data": zero_file_base64(5 * 1024 * 1024 / 3 + 1)
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_unsupported_file_type() {
    let config = TestConfig::default();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let response = app_with(config.to_app_config())
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "patient_id": patient.id,
                "file_name": "notes.txt",
                "file_type": "text/plain",
                "file_data": "aGVsbG8="
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_insert_removes_uploaded_object() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/carepulse-files/prescriptions/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "stored" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path_regex(r"^/storage/v1/object/carepulse-files/prescriptions/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(request(
            "POST",
            "/",
            &token,
            Some(json!({
                "patient_id": patient.id,
                "file_name": "scan.png",
                "file_type": "image/png",
                "file_data": PNG_BASE64
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn patient_cannot_read_another_patients_prescriptions() {
    let config = TestConfig::default();
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let response = app_with(config.to_app_config())
        .oneshot(request("GET", "/patient/someone-else", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_lists_patient_prescriptions() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("leila@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("patient_id", "eq.patient-1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            prescription_row("rx-2", "patient-1", "patient-1", "image/png"),
            prescription_row("rx-1", "patient-1", "patient-1", "application/pdf")
        ])))
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(request("GET", "/patient/patient-1", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["prescriptions"][0]["id"], "rx-2");
}

#[tokio::test]
async fn analyze_extracts_medications_from_image() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("id", "eq.rx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            prescription_row("rx-1", &patient.id, &patient.id, "image/png")
        ])))
        .mount(&mock_server)
        .await;

    let analysis = json!({
        "medications": [{ "name": "Amoxicillin", "dosage": "500mg", "frequency": "3x daily", "duration": "7 days" }],
        "instructions": "Finish the full course",
        "warnings": [],
        "confidence": 0.9
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": analysis.to_string() } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut analyzed = prescription_row("rx-1", &patient.id, &patient.id, "image/png");
    analyzed["analysis"] = analysis.clone();
    analyzed["analyzed_at"] = json!("2026-01-10T09:05:00Z");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("id", "eq.rx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([analyzed])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(request("POST", "/rx-1/analyze", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["analysis"]["medications"][0]["name"], "Amoxicillin");
}

#[tokio::test]
async fn analyze_rejects_pdf_prescriptions() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("jane@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            prescription_row("rx-1", &patient.id, &patient.id, "application/pdf")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = app_with(config.to_app_config())
        .oneshot(request("POST", "/rx-1/analyze", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_uploader_or_admin_deletes() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("leila@example.com");
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            prescription_row("rx-1", "patient-1", "patient-1", "image/png")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/carepulse-files/prescriptions/patient-1/rx-1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("id", "eq.rx-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = app_with(config.to_app_config());

    let doctor_token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let response = app
        .clone()
        .oneshot(request("DELETE", "/rx-1", &doctor_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));
    let response = app
        .oneshot(request("DELETE", "/rx-1", &admin_token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
