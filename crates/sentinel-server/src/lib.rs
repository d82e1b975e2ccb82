//! Sentinel server library logic.
//!
//! Wires the event store, the viewer broadcast registry, and the push
//! subsystem into an axum application. The binary in `main.rs` loads
//! configuration, runs migrations, spawns the fan-out worker, and serves.

pub mod api_camera;
pub mod api_devices;
pub mod api_employees;
pub mod api_events;
pub mod api_push;
pub mod api_ws;
pub mod config;
pub mod error;
pub mod fanout;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use sentinel_db::DbPool;
use sentinel_push::{AlertDispatcher, SubscriptionStore, VapidKeyProvider};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use api_camera::FrameDetector;
use api_ws::ViewerRegistry;
use fanout::FanoutJob;

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across all request handlers.
///
/// Every registry is an explicit owned value constructed once at process
/// start — there are no ambient singletons. Cloning is cheap: all fields
/// are handles.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Live dashboard viewer connections.
    pub viewers: ViewerRegistry,
    /// In-memory push subscriber table.
    pub subscriptions: Arc<SubscriptionStore>,
    /// VAPID signing key provisioner.
    pub vapid_keys: Arc<VapidKeyProvider>,
    /// Push alert dispatcher.
    pub dispatcher: Arc<AlertDispatcher>,
    /// Pluggable camera frame detector.
    pub detector: Arc<dyn FrameDetector>,
    /// Producer side of the fan-out work queue.
    pub fanout_tx: mpsc::Sender<FanoutJob>,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "app": "Sentinel",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/events",
            post(api_events::create_events_handler).get(api_events::get_events_handler),
        )
        .route("/api/events/today", get(api_events::get_today_events_handler))
        .route("/api/events/stats", get(api_events::get_event_stats_handler))
        .route(
            "/api/devices/register",
            post(api_devices::register_device_handler),
        )
        .route("/api/devices", get(api_devices::list_devices_handler))
        .route(
            "/api/devices/{deviceId}",
            get(api_devices::get_device_handler),
        )
        .route(
            "/api/devices/{deviceId}/activate",
            put(api_devices::activate_device_handler),
        )
        .route(
            "/api/devices/{deviceId}/deactivate",
            put(api_devices::deactivate_device_handler),
        )
        .route(
            "/api/employees",
            post(api_employees::create_employee_handler).get(api_employees::list_employees_handler),
        )
        .route(
            "/api/employees/{employeeId}",
            get(api_employees::get_employee_handler).put(api_employees::update_employee_handler),
        )
        .route(
            "/api/push/vapid-public-key",
            get(api_push::vapid_public_key_handler),
        )
        .route("/api/push/subscribe", post(api_push::subscribe_handler))
        .route("/api/push/unsubscribe", post(api_push::unsubscribe_handler))
        .route("/ws", get(api_ws::ws_handler))
        .route("/ws/camera", get(api_camera::camera_ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
