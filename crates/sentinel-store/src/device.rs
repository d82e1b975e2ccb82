//! Device registration and credential authentication.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A registered edge device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// Internal database ID.
    pub id: i64,
    /// Unique public identifier chosen by the device.
    pub device_id: String,
    /// Display name.
    pub device_name: Option<String>,
    /// Hardware model string.
    pub model: Option<String>,
    /// OS version string.
    pub os_version: Option<String>,
    /// Ingestion credential. Unique across all devices.
    pub api_key: String,
    /// Whether the device may authenticate. Deactivated devices keep
    /// their row and credential but always fail authentication.
    pub is_active: bool,
    /// Unix time of the last successful authentication or registration.
    pub last_seen: Option<i64>,
    /// Unix time of first registration.
    pub created_at: i64,
}

/// Parameters for registering (or re-registering) a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeviceParams {
    pub device_id: String,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
}

/// Registers a new device or refreshes an existing one.
///
/// Re-registration updates the descriptive fields, reactivates the device,
/// and touches `last_seen`, but keeps the existing api key so deployed
/// devices are not silently locked out. A new device is stored with
/// `new_api_key`.
///
/// Returns the device row and whether it was newly created.
pub fn register_device(
    conn: &Connection,
    params: &RegisterDeviceParams,
    new_api_key: &str,
    now: i64,
) -> Result<(Device, bool), StoreError> {
    let existing = conn
        .query_row(
            "SELECT id, device_id, device_name, model, os_version, api_key,
                    is_active, last_seen, created_at
             FROM devices WHERE device_id = ?1",
            [&params.device_id],
            map_row_to_device,
        )
        .optional()?;

    if let Some(mut device) = existing {
        conn.execute(
            "UPDATE devices
             SET device_name = ?1, model = ?2, os_version = ?3,
                 is_active = 1, last_seen = ?4
             WHERE device_id = ?5",
            params![
                params.device_name,
                params.model,
                params.os_version,
                now,
                params.device_id,
            ],
        )?;

        device.device_name = params.device_name.clone();
        device.model = params.model.clone();
        device.os_version = params.os_version.clone();
        device.is_active = true;
        device.last_seen = Some(now);
        return Ok((device, false));
    }

    let id: i64 = conn.query_row(
        "INSERT INTO devices (device_id, device_name, model, os_version,
                              api_key, is_active, last_seen, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
         RETURNING id",
        params![
            params.device_id,
            params.device_name,
            params.model,
            params.os_version,
            new_api_key,
            now,
        ],
        |row| row.get(0),
    )?;

    Ok((
        Device {
            id,
            device_id: params.device_id.clone(),
            device_name: params.device_name.clone(),
            model: params.model.clone(),
            os_version: params.os_version.clone(),
            api_key: new_api_key.to_string(),
            is_active: true,
            last_seen: Some(now),
            created_at: now,
        },
        true,
    ))
}

/// Authenticates a device by its api key.
///
/// Only active devices match; a deactivated device's credential fails
/// regardless of prior successful use. On success the device's
/// `last_seen` timestamp is updated as a side effect.
///
/// # Errors
///
/// Returns [`StoreError::Unauthorized`] when no active device owns the key.
pub fn authenticate_device(
    conn: &Connection,
    api_key: &str,
    now: i64,
) -> Result<Device, StoreError> {
    let device = conn
        .query_row(
            "SELECT id, device_id, device_name, model, os_version, api_key,
                    is_active, last_seen, created_at
             FROM devices WHERE api_key = ?1 AND is_active = 1",
            [api_key],
            map_row_to_device,
        )
        .optional()?;

    let mut device = device.ok_or(StoreError::Unauthorized)?;

    conn.execute(
        "UPDATE devices SET last_seen = ?1 WHERE id = ?2",
        params![now, device.id],
    )?;
    device.last_seen = Some(now);

    Ok(device)
}

/// Retrieves a device by its public ID.
pub fn get_device(conn: &Connection, device_id: &str) -> Result<Device, StoreError> {
    conn.query_row(
        "SELECT id, device_id, device_name, model, os_version, api_key,
                is_active, last_seen, created_at
         FROM devices WHERE device_id = ?1",
        [device_id],
        map_row_to_device,
    )
    .optional()?
    .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))
}

/// Lists all registered devices, newest first.
pub fn list_devices(conn: &Connection) -> Result<Vec<Device>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, device_id, device_name, model, os_version, api_key,
                is_active, last_seen, created_at
         FROM devices ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_device)?;
    let mut devices = Vec::new();
    for row in rows {
        devices.push(row?);
    }
    Ok(devices)
}

/// Activates or deactivates a device.
pub fn set_device_active(
    conn: &Connection,
    device_id: &str,
    active: bool,
) -> Result<(), StoreError> {
    let count = conn.execute(
        "UPDATE devices SET is_active = ?1 WHERE device_id = ?2",
        params![active, device_id],
    )?;
    if count == 0 {
        return Err(StoreError::DeviceNotFound(device_id.to_string()));
    }
    Ok(())
}

fn map_row_to_device(row: &Row) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        device_id: row.get(1)?,
        device_name: row.get(2)?,
        model: row.get(3)?,
        os_version: row.get(4)?,
        api_key: row.get(5)?,
        is_active: row.get(6)?,
        last_seen: row.get(7)?,
        created_at: row.get(8)?,
    })
}
