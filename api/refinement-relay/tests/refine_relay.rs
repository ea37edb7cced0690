use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use http::Request;
use refinement_relay::app::{AppState, build_router};
use refinement_relay::config::environment::{AppConfig, RefinementApiVersion};
use refinement_relay::module::refinement::schema::{ErrorResponse, HealthResponse};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower::util::ServiceExt;

#[derive(Debug, Clone)]
struct RecordedCall {
    accept_version: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockUpstream {
    refine_status: u16,
    refine_body: Value,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

fn test_config(endpoint: Option<String>, version: RefinementApiVersion) -> AppConfig {
    AppConfig {
        rust_env: "test".to_string(),
        api_host: "127.0.0.1".to_string(),
        api_port: 0,
        refinement_endpoint: endpoint,
        refinement_api_version: version,
        refiner_id: None,
        pinata_api_key: Some("pinata-key".to_string()),
        pinata_api_secret: None,
        upstream_timeout_seconds: 5,
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
    }
}

async fn spawn_upstream(
    refine_status: u16,
    refine_body: Value,
) -> (String, Arc<Mutex<Vec<RecordedCall>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mock = MockUpstream {
        refine_status,
        refine_body,
        calls: calls.clone(),
    };
    let app = axum::Router::new()
        .route("/refine", post(mock_refine))
        .route("/refine/:job_id", get(mock_status))
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), calls)
}

async fn mock_refine(
    State(mock): State<MockUpstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (axum::http::StatusCode, Json<Value>) {
    mock.calls.lock().expect("calls lock").push(RecordedCall {
        accept_version: headers
            .get("vana-accept-version")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned),
        body,
    });
    (
        axum::http::StatusCode::from_u16(mock.refine_status).expect("status"),
        Json(mock.refine_body.clone()),
    )
}

async fn mock_status(Path(job_id): Path<String>) -> (axum::http::StatusCode, Json<Value>) {
    if job_id == "missing" {
        return (
            axum::http::StatusCode::NOT_FOUND,
            Json(json!({"detail": "job not found"})),
        );
    }
    (
        axum::http::StatusCode::OK,
        Json(json!({"job_id": job_id, "status": "completed"})),
    )
}

fn app_for(config: AppConfig) -> axum::Router {
    build_router(AppState::new(config).expect("state"))
}

#[tokio::test]
async fn v2_refine_attaches_version_header_and_polling_flags() {
    let (endpoint, calls) =
        spawn_upstream(202, json!({"job_id": "job-42", "status": "submitted"})).await;
    let app = app_for(test_config(Some(endpoint), RefinementApiVersion::V2));

    let (status, body) = post_refine(
        app,
        json!({"file_id": 42, "encryption_key": "0xsig", "refiner_id": 7}),
    )
    .await;

    assert_eq!(status, http::StatusCode::ACCEPTED);
    assert_eq!(body["job_id"], "job-42");
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["api_version"], "V2");
    assert_eq!(body["requires_polling"], true);

    let calls = calls.lock().expect("calls lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].accept_version.as_deref(), Some("v2"));
    assert_eq!(calls[0].body["file_id"], 42);
    assert_eq!(calls[0].body["encryption_key"], "0xsig");
    assert_eq!(calls[0].body["refiner_id"], 7);
    assert_eq!(calls[0].body["env_vars"]["PINATA_API_KEY"], "pinata-key");
    assert!(calls[0].body["env_vars"].get("PINATA_API_SECRET").is_none());
}

#[tokio::test]
async fn v1_refine_returns_upstream_body_unmodified() {
    let upstream_body = json!({"add_refinement_tx_hash": "0xabc", "output": {"rows": 3}});
    let (endpoint, calls) = spawn_upstream(200, upstream_body.clone()).await;
    let app = app_for(test_config(Some(endpoint), RefinementApiVersion::V1));

    let (status, body) =
        post_refine(app, json!({"file_id": 42, "encryption_key": "0xsig"})).await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body, upstream_body);
    let calls = calls.lock().expect("calls lock");
    assert_eq!(calls[0].accept_version, None);
    assert!(calls[0].body.get("refiner_id").is_none());
}

#[tokio::test]
async fn upstream_error_status_is_preserved() {
    let (endpoint, _) = spawn_upstream(422, json!({"detail": "bad file"})).await;
    let app = app_for(test_config(Some(endpoint), RefinementApiVersion::V1));

    let (status, body) = post_refine(app, json!({"file_id": 1, "encryption_key": "k"})).await;

    assert_eq!(status, http::StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "bad file");
}

#[tokio::test]
async fn configured_refiner_id_overrides_request() {
    let (endpoint, calls) = spawn_upstream(200, json!({"ok": true})).await;
    let mut config = test_config(Some(endpoint), RefinementApiVersion::V1);
    config.refiner_id = Some("12".to_string());
    let app = app_for(config);

    let _ = post_refine(
        app,
        json!({"file_id": 5, "encryption_key": "k", "refiner_id": 99}),
    )
    .await;

    let calls = calls.lock().expect("calls lock");
    assert_eq!(calls[0].body["refiner_id"], 12);
}

#[tokio::test]
async fn missing_parameters_rejected_for_every_api_version() {
    for version in [RefinementApiVersion::V1, RefinementApiVersion::V2] {
        let (endpoint, calls) = spawn_upstream(200, json!({})).await;
        let app = app_for(test_config(Some(endpoint), version));

        for payload in [
            json!({"encryption_key": "k"}),
            json!({"file_id": 3}),
            json!({"file_id": null, "encryption_key": "k"}),
            json!({"file_id": 3, "encryption_key": ""}),
        ] {
            let (status, body) = post_refine(app.clone(), payload).await;
            assert_eq!(status, http::StatusCode::BAD_REQUEST);
            let err: ErrorResponse = serde_json::from_value(body).expect("error body");
            assert_eq!(
                err.error,
                "Missing required parameters: file_id or encryption_key"
            );
        }
        assert!(calls.lock().expect("calls lock").is_empty());
    }
}

#[tokio::test]
async fn unconfigured_endpoint_returns_500() {
    let app = app_for(test_config(None, RefinementApiVersion::V2));

    let (status, body) = post_refine(app.clone(), json!({"file_id": 1, "encryption_key": "k"})).await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Refinement endpoint not configured"}));

    let (status, body) = get_status(app, "job-1").await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Refinement endpoint not configured"}));
}

#[tokio::test]
async fn unreachable_upstream_returns_fixed_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let app = app_for(test_config(
        Some(format!("http://{addr}")),
        RefinementApiVersion::V1,
    ));

    let (status, body) = post_refine(app.clone(), json!({"file_id": 1, "encryption_key": "k"})).await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to process refinement request"}));

    let (status, body) = get_status(app, "job-1").await;
    assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Failed to check job status"}));
}

#[tokio::test]
async fn job_status_is_proxied_with_upstream_status() {
    let (endpoint, _) = spawn_upstream(200, json!({})).await;
    let app = app_for(test_config(Some(endpoint), RefinementApiVersion::V2));

    let (status, body) = get_status(app.clone(), "job-42").await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(body, json!({"job_id": "job-42", "status": "completed"}));

    let (status, body) = get_status(app, "missing").await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "job not found"}));
}

#[tokio::test]
async fn health_reports_endpoint_configuration() {
    let app = app_for(test_config(None, RefinementApiVersion::V2));
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), http::StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let health: HealthResponse = serde_json::from_slice(&body).expect("parse body");
    assert!(!health.ok);
    assert!(!health.endpoint_configured);
    assert_eq!(health.api_version, "V2");
}

async fn post_refine(app: axum::Router, payload: Value) -> (http::StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/refine")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload: Value = serde_json::from_slice(&body).expect("parse body");
    (status, payload)
}

async fn get_status(app: axum::Router, job_id: &str) -> (http::StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(format!("/refine/{job_id}"))
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload: Value = serde_json::from_slice(&body).expect("parse body");
    (status, payload)
}
