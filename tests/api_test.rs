use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use api_scaffold::config::{AuthConfig, ServerConfig};
use api_scaffold::{create_router, AppConfig, Environment};

const SECRET: &str = "integration-test-secret";

fn app(environment: Environment) -> Router {
    let config = AppConfig {
        environment,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
        },
    };
    let handle = PrometheusBuilder::new().build_recorder().handle();
    create_router(&config, handle)
}

struct TestResponse {
    status: StatusCode,
    request_id: Option<String>,
    body: Value,
    raw: Vec<u8>,
}

async fn send(router: Router, req: Request<Body>) -> TestResponse {
    let response = router.oneshot(req).await.expect("Failed to send request");

    let status = response.status();
    let request_id = response
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        request_id,
        body,
        raw: bytes.to_vec(),
    }
}

async fn get(router: Router, uri: &str) -> TestResponse {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, req).await
}

async fn post_json(router: Router, uri: &str, body: &str) -> TestResponse {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, req).await
}

async fn get_with_token(router: Router, token: &str) -> TestResponse {
    let req = Request::builder()
        .uri("/api/example/protected")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    send(router, req).await
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: i64,
}

fn token(secret: &str, exp_offset_secs: i64) -> String {
    let claims = TestClaims {
        sub: "user-42".to_string(),
        exp: Utc::now().timestamp() + exp_offset_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn assert_error_envelope(res: &TestResponse, status: u16, message: &str, path: &str) {
    assert_eq!(res.status.as_u16(), status);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["statusCode"], status);
    assert_eq!(res.body["message"], message);
    assert_eq!(res.body["path"], path);
    assert!(res.body.get("data").is_none());
    let timestamp = res.body["timestamp"].as_str().unwrap();
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_health_check() {
    let res = get(app(Environment::Development), "/health").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "OK");
    assert!(res.body["timestamp"].is_string());
}

#[tokio::test]
async fn test_ready_reports_environment() {
    let res = get(app(Environment::Production), "/ready").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["environment"], "production");
}

#[tokio::test]
async fn test_success_example() {
    let res = get(app(Environment::Development), "/api/example/success").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["statusCode"], 200);
    assert_eq!(res.body["message"], "Data retrieved successfully");
    assert_eq!(res.body["data"]["id"], 1);
    assert_eq!(res.body["data"]["name"], "Example Data");
    assert!(res.body.get("errors").is_none());
    assert!(res.body.get("path").is_none());
}

#[tokio::test]
async fn test_create_example() {
    let res = post_json(
        app(Environment::Development),
        "/api/example/create",
        r#"{"name":"Widget"}"#,
    )
    .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["statusCode"], 201);
    assert_eq!(res.body["message"], "Resource created successfully");
    assert_eq!(res.body["data"]["name"], "Widget");
    assert!(res.body["data"]["id"].is_i64());
    assert!(res.body["data"]["createdAt"].is_string());
}

#[tokio::test]
async fn test_create_without_name_is_validation_error() {
    for body in ["{}", r#"{"name":""}"#, r#"{"name":null}"#] {
        let res = post_json(app(Environment::Production), "/api/example/create", body).await;

        assert_error_envelope(&res, 422, "Name is required", "/api/example/create");
        let errors = res.body["errors"].as_array().unwrap();
        assert!(
            errors.iter().any(|e| e["field"] == "name"),
            "no name entry for body {body}"
        );
    }
}

#[tokio::test]
async fn test_create_with_wrong_type_is_422() {
    let res = post_json(
        app(Environment::Development),
        "/api/example/create",
        r#"{"name":5}"#,
    )
    .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["success"], false);
}

#[tokio::test]
async fn test_create_with_malformed_body_is_400() {
    let res = post_json(app(Environment::Development), "/api/example/create", "{").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["statusCode"], 400);
    assert_eq!(res.body["path"], "/api/example/create");
}

#[tokio::test]
async fn test_create_without_json_body_is_validation_error() {
    let no_body = Request::builder()
        .method("POST")
        .uri("/api/example/create")
        .body(Body::empty())
        .unwrap();
    let untyped = Request::builder()
        .method("POST")
        .uri("/api/example/create")
        .body(Body::from(r#"{"name":"Widget"}"#))
        .unwrap();
    let typed_empty = Request::builder()
        .method("POST")
        .uri("/api/example/create")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::empty())
        .unwrap();

    for req in [no_body, untyped, typed_empty] {
        let res = send(app(Environment::Production), req).await;

        assert_error_envelope(&res, 422, "Name is required", "/api/example/create");
        let errors = res.body["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e["field"] == "name"));
    }
}

#[tokio::test]
async fn test_not_found_example() {
    let res = get(app(Environment::Production), "/api/example/not-found/42").await;
    assert_error_envelope(
        &res,
        404,
        "Resource with id 42 not found",
        "/api/example/not-found/42",
    );
}

#[tokio::test]
async fn test_bad_request_example() {
    let res = get(app(Environment::Production), "/api/example/error").await;
    assert_error_envelope(
        &res,
        400,
        "This is a bad request error example",
        "/api/example/error",
    );
    assert!(res.body.get("errors").is_none());
}

#[tokio::test]
async fn test_unexpected_error_in_development() {
    let res = get(app(Environment::Development), "/api/example/unexpected").await;
    assert_error_envelope(&res, 500, "This is an unexpected error", "/api/example/unexpected");

    let errors = res.body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["stack"]
        .as_str()
        .unwrap()
        .contains("This is an unexpected error"));
}

#[tokio::test]
async fn test_unexpected_error_in_production() {
    let res = get(app(Environment::Production), "/api/example/unexpected").await;
    assert_error_envelope(&res, 500, "Internal Server Error", "/api/example/unexpected");
    assert!(res.body.get("errors").is_none());
    assert!(!String::from_utf8_lossy(&res.raw).contains("stack"));
}

#[tokio::test]
async fn test_panicking_handler_is_forwarded() {
    let res = get(app(Environment::Development), "/api/example/panic").await;
    assert_error_envelope(
        &res,
        500,
        "Handler panicked: This is a panicking handler",
        "/api/example/panic",
    );

    let res = get(app(Environment::Production), "/api/example/panic").await;
    assert_error_envelope(&res, 500, "Internal Server Error", "/api/example/panic");
}

#[tokio::test]
async fn test_undefined_route() {
    let res = get(app(Environment::Production), "/api/users").await;
    assert_error_envelope(&res, 404, "Route /api/users not found", "/api/users");

    let res = get(app(Environment::Production), "/nope?page=2").await;
    assert_error_envelope(&res, 404, "Route /nope?page=2 not found", "/nope");

    let res = get(app(Environment::Production), "/api/example/missing").await;
    assert_error_envelope(
        &res,
        404,
        "Route /api/example/missing not found",
        "/api/example/missing",
    );
}

#[tokio::test]
async fn test_wrong_method_uses_not_found_envelope() {
    let req = Request::builder()
        .method("POST")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let res = send(app(Environment::Production), req).await;
    assert_error_envelope(&res, 404, "Route /health not found", "/health");

    let res = get(app(Environment::Production), "/api/example/create").await;
    assert_error_envelope(
        &res,
        404,
        "Route /api/example/create not found",
        "/api/example/create",
    );
}

#[tokio::test]
async fn test_record_lookup_maps_database_error() {
    let res = get(app(Environment::Production), "/api/example/record/7").await;
    assert_error_envelope(&res, 404, "Record not found", "/api/example/record/7");

    let res = get(app(Environment::Production), "/api/example/record/abc").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
}

#[tokio::test]
async fn test_protected_requires_token() {
    let res = get(app(Environment::Development), "/api/example/protected").await;
    assert_error_envelope(&res, 401, "Authentication required", "/api/example/protected");
}

#[tokio::test]
async fn test_protected_rejects_bad_tokens() {
    let res = get_with_token(app(Environment::Development), "not-a-jwt").await;
    assert_error_envelope(&res, 401, "Invalid token", "/api/example/protected");

    let res = get_with_token(app(Environment::Development), &token("other-secret", 3600)).await;
    assert_error_envelope(&res, 401, "Invalid token", "/api/example/protected");

    let res = get_with_token(app(Environment::Development), &token(SECRET, -3600)).await;
    assert_error_envelope(&res, 401, "Token expired", "/api/example/protected");
}

#[tokio::test]
async fn test_protected_accepts_valid_token() {
    let res = get_with_token(app(Environment::Development), &token(SECRET, 3600)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"], json!({"subject": "user-42"}));
}

#[tokio::test]
async fn test_delete_returns_no_content() {
    let req = Request::builder()
        .method("DELETE")
        .uri("/api/example/item/9")
        .body(Body::empty())
        .unwrap();
    let res = send(app(Environment::Development), req).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.raw.is_empty());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let req = Request::builder()
        .uri("/api/example/error")
        .header("X-Request-Id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let res = send(app(Environment::Development), req).await;
    assert_eq!(res.request_id.as_deref(), Some("abc-123"));

    let res = get(app(Environment::Development), "/health").await;
    assert!(res.request_id.is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let res = get(app(Environment::Development), "/metrics").await;
    assert_eq!(res.status, StatusCode::OK);
}
