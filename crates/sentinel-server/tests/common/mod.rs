//! Shared fixtures for server integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use sentinel_push::{AlertDispatcher, SubscriptionStore, VapidKeyProvider, WebPushClient};
use sentinel_server::api_camera::NoopDetector;
use sentinel_server::api_ws::ViewerRegistry;
use sentinel_server::{app, fanout, AppState};
use tower::ServiceExt;

/// A fully wired application over a throwaway file-backed database.
///
/// A file database (not `:memory:`) is required because the pool hands
/// out multiple connections and they must all see the same data.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    /// Holds the database file and VAPID key dir alive for the test.
    pub data_dir: tempfile::TempDir,
}

/// Builds the app with migrations applied and the fan-out worker running.
/// Must be called from within a tokio runtime.
pub fn build_app() -> TestApp {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let db_path = data_dir.path().join("sentinel.db");

    let pool = sentinel_db::create_pool(
        db_path.to_str().expect("utf-8 temp path"),
        sentinel_db::DbRuntimeSettings::default(),
    )
    .expect("pool creation should succeed");
    {
        let conn = pool.get().expect("connection for migrations");
        sentinel_db::run_migrations(&conn).expect("migrations should succeed");
    }

    let subscriptions = Arc::new(SubscriptionStore::new());
    let vapid_keys = Arc::new(VapidKeyProvider::new(data_dir.path().join("keys")));
    let push_client = WebPushClient::new("admin@example.com", Duration::from_secs(2), 3600)
        .expect("push client should build");
    let dispatcher = Arc::new(AlertDispatcher::new(
        subscriptions.clone(),
        vapid_keys.clone(),
        push_client,
    ));

    let (fanout_tx, fanout_rx) = fanout::fanout_channel();

    let state = AppState {
        pool,
        viewers: ViewerRegistry::new(),
        subscriptions,
        vapid_keys,
        dispatcher,
        detector: Arc::new(NoopDetector),
        fanout_tx,
    };

    tokio::spawn(fanout::run_worker(state.clone(), fanout_rx));

    let router = app(state.clone());

    TestApp {
        state,
        router,
        data_dir,
    }
}

/// Sends one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("request should not fail at the service level")
}

/// Convenience: JSON POST.
pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// Convenience: GET.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

/// Reads a JSON response body.
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Registers a device through the API and returns its api key.
pub async fn register_device(router: &Router, device_id: &str) -> String {
    let response = send(
        router,
        json_post(
            "/api/devices/register",
            serde_json::json!({
                "deviceId": device_id,
                "deviceName": "Test Camera",
                "model": "PX-30",
                "osVersion": "14"
            }),
        ),
    )
    .await;
    assert!(response.status().is_success(), "registration should succeed");

    let body = json_body(response).await;
    body["api_key"]
        .as_str()
        .expect("registration returns api_key")
        .to_string()
}

/// An authenticated ingestion POST.
pub fn ingest_post(api_key: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/events")
        .header("content-type", "application/json")
        .header("X-API-Key", api_key)
        .body(Body::from(body.to_string()))
        .expect("request should build")
}
