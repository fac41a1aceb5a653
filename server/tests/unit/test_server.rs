//! HTTP surface

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use kabinet::server::serve::router;
use kabinet::server::state::ServerState;

use crate::common::{cpu_only, harness, FakeRuntime, Harness};

fn app(h: &Harness) -> Router {
    router(Arc::new(ServerState::new(
        h.state.store.clone(),
        h.state.backend.clone(),
        h.state.broadcaster.clone(),
    )))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn release_body() -> Value {
    json!({
        "app": "demo-app",
        "version": "1.0.0",
        "flavours": [
            {"name": "cuda", "image": "demo/cuda:1", "selectors": [{"kind": "cuda"}]},
            {"name": "vanilla", "image": "demo/vanilla:1", "selectors": []}
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let (status, body) = call(&app(&h), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "kabinet");
}

#[tokio::test]
async fn test_setup_deploy_status_and_logs() {
    let h = harness(
        FakeRuntime::with_images(&["demo/cuda:1", "demo/vanilla:1"]),
        cpu_only(),
    )
    .await;
    let app = app(&h);

    let (status, created) = call(&app, "POST", "/releases", Some(release_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let release_id = created["release"]["id"].as_str().unwrap().to_string();
    let vanilla_id = created["flavours"][1]["id"].as_str().unwrap().to_string();

    let (status, selection) = call(
        &app,
        "GET",
        &format!("/releases/{}/fitting-flavour", release_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selection["flavour"]["name"], "vanilla");
    assert_eq!(selection["rejections"][0]["flavour_name"], "cuda");

    let (status, setup) = call(
        &app,
        "POST",
        "/setups",
        Some(json!({
            "release_id": release_id,
            "installer": "arkitekt",
            "api_token": "very-secret"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(setup["flavour_id"], vanilla_id.as_str());
    assert!(setup.get("api_token").is_none());
    let setup_id = setup["id"].as_str().unwrap();

    let (status, pod) = call(&app, "POST", &format!("/setups/{}/deploy", setup_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let pod_id = pod["id"].as_str().unwrap().to_string();
    let container = pod["pod_id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", &format!("/pods/{}/status", pod_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RUNNING");

    let (status, body) = call(
        &app,
        "PUT",
        &format!("/pods/{}/status", pod_id),
        Some(json!({"status": "runing"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("runing"));

    h.runtime.remove_container(&container);

    let (_, body) = call(&app, "GET", &format!("/pods/{}/status", pod_id), None).await;
    assert_eq!(body["status"], "UNKNOWN");
    let (status, body) = call(&app, "GET", &format!("/pods/{}/logs", pod_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"], "");
}

#[tokio::test]
async fn test_unknown_pod_is_404() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let (status, body) = call(&app(&h), "GET", "/pods/missing/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_no_fitting_flavour_is_conflict() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let app = app(&h);
    let (_, created) = call(&app, "POST", "/releases", Some(release_body())).await;
    let release_id = created["release"]["id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        "GET",
        &format!("/releases/{}/fitting-flavour", release_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("demo/vanilla:1"));
}

#[tokio::test]
async fn test_bad_selector_is_bad_request() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let (status, body) = call(
        &app(&h),
        "POST",
        "/releases",
        Some(json!({
            "app": "demo-app",
            "version": "1.0.0",
            "flavours": [{"name": "x", "image": "x:1", "selectors": [{"kind": "cpu", "cores": 4}]}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cpu"));
}
