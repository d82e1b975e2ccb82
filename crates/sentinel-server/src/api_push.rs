//! Push subscription API.

use std::sync::Arc;

use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

/// `GET /api/push/vapid-public-key`.
///
/// Generates the key pair on the first call; every later call returns the
/// identical cached key. Generation does file I/O, so it runs on the
/// blocking pool.
pub async fn vapid_public_key_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let keys = state.vapid_keys.clone();
    let public_key = tokio::task::spawn_blocking(move || keys.public_key())
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("signing key unavailable: {e}")))?;

    Ok(Json(json!({ "publicKey": public_key })))
}

/// `POST /api/push/subscribe`.
///
/// The body is the provider-issued subscription object. Only the
/// `endpoint` field is read here (as the map key); the rest is stored
/// verbatim and parsed solely by the delivery transport.
pub async fn subscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(subscription): Json<Value>,
) -> Json<Value> {
    let endpoint = subscription
        .get("endpoint")
        .and_then(|value| value.as_str())
        .unwrap_or("");

    let success = match serde_json::to_string(&subscription) {
        Ok(payload) => state.subscriptions.subscribe(endpoint, &payload, "anonymous"),
        Err(e) => {
            tracing::error!("failed to re-serialize subscription payload: {}", e);
            false
        }
    };

    Json(json!({ "success": success }))
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    #[serde(default)]
    pub endpoint: String,
}

/// `POST /api/push/unsubscribe`.
pub async fn unsubscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<UnsubscribeRequest>,
) -> Json<Value> {
    let success = state.subscriptions.unsubscribe(&request.endpoint);
    Json(json!({ "success": success }))
}
