//! Event ingestion and query API.

use std::sync::Arc;

use axum::extract::Query;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use sentinel_store::{
    authenticate_device, create_events, employee_name, event_stats, events_since, query_events,
    today_start_timestamp, unix_now, EventFilter, EventRecord, EventStats, NewEvent,
};
use serde::{Deserialize, Serialize};

use crate::error::{with_blocking_conn, ApiError};
use crate::fanout::FanoutJob;
use crate::AppState;

/// Header carrying the device credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// One event in an ingestion batch.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64,
    #[serde(rename = "trackId", alias = "track_id", default)]
    pub track_id: Option<i64>,
    #[serde(rename = "employeeId", alias = "employee_id", default)]
    pub employee_id: Option<String>,
    #[serde(rename = "licensePlate", alias = "license_plate", default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub confidence: f64,
}

/// Ingestion request body.
///
/// The `deviceId` field is accepted for wire compatibility but never
/// trusted: the identity from the authenticated credential overrides it,
/// so one device cannot attribute events to another.
#[derive(Debug, Deserialize)]
pub struct BatchEventRequest {
    #[serde(rename = "deviceId", alias = "device_id", default)]
    pub device_id: Option<String>,
    pub events: Vec<EventInput>,
}

/// Ingestion response body.
#[derive(Debug, Serialize)]
pub struct BatchEventResponse {
    pub success: bool,
    pub processed: usize,
    pub message: String,
}

/// Extracts the device credential from the request headers.
fn api_key_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .ok_or(ApiError::Unauthorized)
}

/// `POST /api/events` — authenticated batch ingestion.
///
/// The batch is persisted all-or-nothing; on success one fan-out job per
/// created event is enqueued in acceptance order. Fan-out is best-effort:
/// a full queue drops the job with a warning and never fails the call.
pub async fn create_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BatchEventRequest>,
) -> Result<Json<BatchEventResponse>, ApiError> {
    let api_key = api_key_from_headers(&headers)?;

    for event in &request.events {
        if event.event_type.is_empty() {
            return Err(ApiError::Validation("event type must not be empty".to_string()));
        }
        if event.timestamp < 0 {
            return Err(ApiError::Validation("event timestamp must not be negative".to_string()));
        }
    }

    let now = unix_now();
    let items: Vec<NewEvent> = request
        .events
        .iter()
        .map(|event| NewEvent {
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
            track_id: event.track_id,
            employee_id: event.employee_id.clone(),
            license_plate: event.license_plate.clone(),
            duration: event.duration,
            confidence: event.confidence,
        })
        .collect();

    let jobs = with_blocking_conn(state.pool.clone(), move |conn| {
        let device = authenticate_device(conn, &api_key, now)?;
        let created = create_events(conn, &device.device_id, &items, now)?;

        // Resolve employee display names once, while we hold a connection;
        // the fan-out worker then needs no extra lookups per event.
        let mut jobs = Vec::with_capacity(created.len());
        for event in created {
            let employee_name = match &event.employee_id {
                Some(id) => employee_name(conn, id)?,
                None => None,
            };
            jobs.push(FanoutJob {
                event,
                employee_name,
            });
        }
        Ok(jobs)
    })
    .await?;

    let processed = jobs.len();
    for job in jobs {
        let event_id = job.event.id;
        if let Err(e) = state.fanout_tx.try_send(job) {
            tracing::warn!(
                event_id,
                "fan-out queue full, dropping broadcast for event: {}",
                e
            );
        }
    }

    Ok(Json(BatchEventResponse {
        success: true,
        processed,
        message: format!("Successfully processed {processed} events"),
    }))
}

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub event_type: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// `GET /api/events` — filtered event listing, newest timestamp first.
pub async fn get_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let filter = EventFilter {
        event_type: query.event_type,
        start_time: query.start_time,
        end_time: query.end_time,
        limit: query.limit.unwrap_or(100).clamp(1, 1000),
        offset: query.offset.unwrap_or(0).max(0),
    };

    let events =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(query_events(conn, &filter)?))
            .await?;
    Ok(Json(events))
}

/// `GET /api/events/today` — all events since local midnight.
pub async fn get_today_events_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let since = today_start_timestamp();
    let events =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(events_since(conn, since)?))
            .await?;
    Ok(Json(events))
}

/// `GET /api/events/stats` — today's aggregate counts.
pub async fn get_event_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<EventStats>, ApiError> {
    let since = today_start_timestamp();
    let stats =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(event_stats(conn, since)?))
            .await?;
    Ok(Json(stats))
}
