//! Query helpers for the Sentinel event store.
//!
//! Implements device registration and credential authentication, atomic
//! batch event persistence, filtered event queries with daily statistics,
//! and employee record management. All functions take a borrowed
//! [`rusqlite::Connection`] so callers decide pooling and threading; the
//! server calls these from `tokio::task::spawn_blocking`.

mod device;
mod employee;
mod event;

use thiserror::Error;

pub use device::{
    authenticate_device, get_device, list_devices, register_device, set_device_active, Device,
    RegisterDeviceParams,
};
pub use employee::{
    create_employee, employee_name, get_employee, list_employees, update_employee,
    CreateEmployeeParams, Employee, UpdateEmployeeParams,
};
pub use event::{
    create_events, event_stats, events_since, query_events, EventFilter, EventRecord, EventStats,
    NewEvent,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid or inactive api key")]
    Unauthorized,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("employee not found: {0}")]
    EmployeeNotFound(String),
    #[error("employee already exists: {0}")]
    EmployeeExists(String),
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unix timestamp of local midnight today.
///
/// Used as the lower bound for "today" queries and stats. Falls back to
/// UTC midnight when the local midnight is ambiguous (DST transitions).
pub fn today_start_timestamp() -> i64 {
    use chrono::{Local, NaiveTime, TimeZone, Utc};

    let midnight = NaiveTime::MIN;
    let today = Local::now().date_naive();
    match Local.from_local_datetime(&today.and_time(midnight)).earliest() {
        Some(dt) => dt.timestamp(),
        None => Utc
            .from_utc_datetime(&today.and_time(midnight))
            .timestamp(),
    }
}
