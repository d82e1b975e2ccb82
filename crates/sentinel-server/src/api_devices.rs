//! Device management API.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sentinel_store::{
    get_device, list_devices, register_device, set_device_active, unix_now, Device,
    RegisterDeviceParams,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{with_blocking_conn, ApiError};
use crate::AppState;

/// Generates a 32-byte URL-safe random api key.
fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct DeviceRegistration {
    #[serde(rename = "deviceId", alias = "device_id")]
    pub device_id: String,
    #[serde(rename = "deviceName", alias = "device_name", default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(rename = "osVersion", alias = "os_version", default)]
    pub os_version: Option<String>,
}

/// Registration response: the api key the device must present on every
/// ingestion call.
#[derive(Debug, Serialize)]
pub struct DeviceRegistrationResponse {
    pub success: bool,
    pub api_key: String,
    pub message: String,
}

/// Public device projection. Never exposes the api key.
#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<i64>,
}

impl From<Device> for DeviceInfo {
    fn from(device: Device) -> Self {
        Self {
            device_id: device.device_id,
            device_name: device.device_name,
            model: device.model,
            is_active: device.is_active,
            last_seen: device.last_seen,
        }
    }
}

/// `POST /api/devices/register` — register a new device or refresh an
/// existing one. Re-registration keeps the existing api key.
pub async fn register_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(registration): Json<DeviceRegistration>,
) -> Result<Json<DeviceRegistrationResponse>, ApiError> {
    if registration.device_id.is_empty() {
        return Err(ApiError::Validation("device id must not be empty".to_string()));
    }

    let params = RegisterDeviceParams {
        device_id: registration.device_id,
        device_name: registration.device_name,
        model: registration.model,
        os_version: registration.os_version,
    };
    let candidate_key = generate_api_key();
    let now = unix_now();

    let (device, created) = with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(register_device(conn, &params, &candidate_key, now)?)
    })
    .await?;

    let message = if created {
        "Device registered successfully"
    } else {
        "Device updated successfully"
    };

    Ok(Json(DeviceRegistrationResponse {
        success: true,
        api_key: device.api_key,
        message: message.to_string(),
    }))
}

/// `GET /api/devices` — all registered devices, newest first.
pub async fn list_devices_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<DeviceInfo>>, ApiError> {
    let devices =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(list_devices(conn)?)).await?;
    Ok(Json(devices.into_iter().map(DeviceInfo::from).collect()))
}

/// `GET /api/devices/{deviceId}`.
pub async fn get_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceInfo>, ApiError> {
    let device =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(get_device(conn, &device_id)?))
            .await?;
    Ok(Json(device.into()))
}

/// `PUT /api/devices/{deviceId}/activate`.
pub async fn activate_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(set_device_active(conn, &device_id, true)?)
    })
    .await?;
    Ok(Json(json!({ "success": true, "message": "Device activated" })))
}

/// `PUT /api/devices/{deviceId}/deactivate` — the device row and its
/// credential survive, but authentication fails until reactivation.
pub async fn deactivate_device_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(set_device_active(conn, &device_id, false)?)
    })
    .await?;
    Ok(Json(json!({ "success": true, "message": "Device deactivated" })))
}
