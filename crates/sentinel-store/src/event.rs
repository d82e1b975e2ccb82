//! Event persistence and queries.
//!
//! Batch writes go through [`create_events`], which wraps the whole batch
//! in a single transaction: either every event in the batch is persisted
//! or none is. Reads go through [`query_events`] / [`events_since`] /
//! [`event_stats`].

use rusqlite::{params, Connection, Row};
use sentinel_types::{PEOPLE_EVENT_TAGS, VEHICLE_EVENT_TAGS};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A persisted security event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Server-assigned, monotonically increasing identifier.
    pub id: i64,
    /// Event tag (open set; see `sentinel_types::EventKind` for the
    /// well-known values).
    pub event_type: String,
    /// Device-supplied unix timestamp. Used for filtering, not ordering
    /// of persistence.
    pub timestamp: i64,
    /// Device-local tracker id, when the detector tracks objects.
    pub track_id: Option<i64>,
    /// Identity of the reporting device (always the authenticated one).
    pub device_id: String,
    /// Referenced employee, for recognition events.
    pub employee_id: Option<String>,
    /// Recognized license plate, for vehicle events.
    pub license_plate: Option<String>,
    /// Event duration in milliseconds.
    pub duration: i64,
    /// Detector confidence.
    pub confidence: f64,
    /// Unix time the row was inserted.
    pub created_at: i64,
}

/// Input for one event in a batch write.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub event_type: String,
    pub timestamp: i64,
    pub track_id: Option<i64>,
    pub employee_id: Option<String>,
    pub license_plate: Option<String>,
    pub duration: i64,
    pub confidence: f64,
}

/// Persists a batch of events attributed to `device_id`, all-or-nothing.
///
/// Every insert runs inside one transaction; if any row fails, the
/// transaction rolls back and no event from the batch is visible
/// afterwards. On success, returns the created records with their
/// server-assigned ids in batch order (ids are strictly increasing).
pub fn create_events(
    conn: &mut Connection,
    device_id: &str,
    items: &[NewEvent],
    now: i64,
) -> Result<Vec<EventRecord>, StoreError> {
    let tx = conn.transaction()?;
    let mut created = Vec::with_capacity(items.len());

    for item in items {
        let id: i64 = tx.query_row(
            "INSERT INTO events (event_type, timestamp, track_id, device_id,
                                 employee_id, license_plate, duration,
                                 confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING id",
            params![
                item.event_type,
                item.timestamp,
                item.track_id,
                device_id,
                item.employee_id,
                item.license_plate,
                item.duration,
                item.confidence,
                now,
            ],
            |row| row.get(0),
        )?;

        created.push(EventRecord {
            id,
            event_type: item.event_type.clone(),
            timestamp: item.timestamp,
            track_id: item.track_id,
            device_id: device_id.to_string(),
            employee_id: item.employee_id.clone(),
            license_plate: item.license_plate.clone(),
            duration: item.duration,
            confidence: item.confidence,
            created_at: now,
        });
    }

    tx.commit()?;
    Ok(created)
}

/// Filter criteria for querying events.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Filter by exact event tag.
    pub event_type: Option<String>,
    /// Return events with `timestamp >= start_time`.
    pub start_time: Option<i64>,
    /// Return events with `timestamp <= end_time`.
    pub end_time: Option<i64>,
    /// Maximum number of events to return.
    pub limit: i64,
    /// Number of events to skip.
    pub offset: i64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            event_type: None,
            start_time: None,
            end_time: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Queries events with optional filters, newest timestamp first.
pub fn query_events(conn: &Connection, filter: &EventFilter) -> Result<Vec<EventRecord>, StoreError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(event_type) = &filter.event_type {
        clauses.push(format!("event_type = ?{}", idx));
        values.push(Box::new(event_type.clone()));
        idx += 1;
    }
    if let Some(start) = filter.start_time {
        clauses.push(format!("timestamp >= ?{}", idx));
        values.push(Box::new(start));
        idx += 1;
    }
    if let Some(end) = filter.end_time {
        clauses.push(format!("timestamp <= ?{}", idx));
        values.push(Box::new(end));
        idx += 1;
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT id, event_type, timestamp, track_id, device_id, employee_id,
                license_plate, duration, confidence, created_at
         FROM events {} ORDER BY timestamp DESC LIMIT ?{} OFFSET ?{}",
        where_sql,
        idx,
        idx + 1
    );
    values.push(Box::new(filter.limit));
    values.push(Box::new(filter.offset));

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), map_row_to_event)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// Returns all events with `timestamp >= since`, newest first.
pub fn events_since(conn: &Connection, since: i64) -> Result<Vec<EventRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, event_type, timestamp, track_id, device_id, employee_id,
                license_plate, duration, confidence, created_at
         FROM events WHERE timestamp >= ?1 ORDER BY timestamp DESC",
    )?;

    let rows = stmt.query_map([since], map_row_to_event)?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

/// Aggregate event counts since a timestamp (normally local midnight).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventStats {
    pub total_today: i64,
    pub people_events: i64,
    pub vehicle_events: i64,
}

/// Counts total, people, and vehicle events with `timestamp >= since`.
pub fn event_stats(conn: &Connection, since: i64) -> Result<EventStats, StoreError> {
    let total_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE timestamp >= ?1",
        [since],
        |row| row.get(0),
    )?;

    let [p0, p1, p2, p3] = PEOPLE_EVENT_TAGS;
    let people_events: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events
         WHERE timestamp >= ?1 AND event_type IN (?2, ?3, ?4, ?5)",
        params![since, p0, p1, p2, p3],
        |row| row.get(0),
    )?;

    let [v0, v1] = VEHICLE_EVENT_TAGS;
    let vehicle_events: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events
         WHERE timestamp >= ?1 AND event_type IN (?2, ?3)",
        params![since, v0, v1],
        |row| row.get(0),
    )?;

    Ok(EventStats {
        total_today,
        people_events,
        vehicle_events,
    })
}

fn map_row_to_event(row: &Row) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: row.get(0)?,
        event_type: row.get(1)?,
        timestamp: row.get(2)?,
        track_id: row.get(3)?,
        device_id: row.get(4)?,
        employee_id: row.get(5)?,
        license_plate: row.get(6)?,
        duration: row.get(7)?,
        confidence: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{register_device, RegisterDeviceParams};
    use sentinel_db::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        // The pool enables this pragma in production; raw test connections
        // need it explicitly for the device foreign key to be enforced.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("pragma should succeed");
        run_migrations(&conn).expect("migrations should succeed");
        register_device(
            &conn,
            &RegisterDeviceParams {
                device_id: "cam-1".to_string(),
                device_name: None,
                model: None,
                os_version: None,
            },
            "key-1",
            1_000,
        )
        .expect("device registration should succeed");
        conn
    }

    fn new_event(tag: &str, timestamp: i64) -> NewEvent {
        NewEvent {
            event_type: tag.to_string(),
            timestamp,
            ..NewEvent::default()
        }
    }

    #[test]
    fn batch_persists_all_events_with_increasing_ids() {
        let mut conn = test_conn();
        let batch = vec![
            new_event("PERSON_ENTERED", 10),
            new_event("UNKNOWN_FACE_DETECTED", 11),
            new_event("VEHICLE_ENTERED", 12),
        ];

        let created = create_events(&mut conn, "cam-1", &batch, 2_000)
            .expect("batch write should succeed");

        assert_eq!(created.len(), 3);
        for window in created.windows(2) {
            assert!(window[0].id < window[1].id, "ids must be increasing");
        }
        for event in &created {
            assert_eq!(event.device_id, "cam-1");
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .expect("count query should succeed");
        assert_eq!(count, 3);
    }

    #[test]
    fn failing_batch_leaves_no_partial_rows() {
        let mut conn = test_conn();
        create_events(&mut conn, "cam-1", &[new_event("PERSON_ENTERED", 10)], 2_000)
            .expect("valid batch should succeed");

        // An unregistered device violates the events.device_id foreign key,
        // aborting the transaction mid-batch.
        let bad_batch = vec![new_event("PERSON_ENTERED", 20), new_event("PERSON_EXITED", 21)];
        let err = create_events(&mut conn, "ghost", &bad_batch, 2_100)
            .expect_err("unknown device must violate the foreign key");
        assert!(matches!(err, StoreError::Database(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .expect("count query should succeed");
        assert_eq!(count, 1, "failed batch must leave no partial rows");
    }

    #[test]
    fn query_filters_by_type_and_time() {
        let mut conn = test_conn();
        let batch = vec![
            new_event("PERSON_ENTERED", 100),
            new_event("PERSON_ENTERED", 200),
            new_event("VEHICLE_ENTERED", 300),
        ];
        create_events(&mut conn, "cam-1", &batch, 2_000).expect("batch write should succeed");

        let by_type = query_events(
            &conn,
            &EventFilter {
                event_type: Some("PERSON_ENTERED".to_string()),
                ..EventFilter::default()
            },
        )
        .expect("query should succeed");
        assert_eq!(by_type.len(), 2);
        assert!(by_type[0].timestamp > by_type[1].timestamp, "newest first");

        let windowed = query_events(
            &conn,
            &EventFilter {
                start_time: Some(150),
                end_time: Some(250),
                ..EventFilter::default()
            },
        )
        .expect("query should succeed");
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].timestamp, 200);
    }

    #[test]
    fn stats_count_groupings() {
        let mut conn = test_conn();
        let batch = vec![
            new_event("PERSON_ENTERED", 100),
            new_event("EMPLOYEE_ARRIVED", 110),
            new_event("VEHICLE_ENTERED", 120),
            new_event("UNKNOWN_FACE_DETECTED", 130),
            // Outside the window:
            new_event("VEHICLE_EXITED", 10),
        ];
        create_events(&mut conn, "cam-1", &batch, 2_000).expect("batch write should succeed");

        let stats = event_stats(&conn, 50).expect("stats query should succeed");
        assert_eq!(
            stats,
            EventStats {
                total_today: 4,
                people_events: 2,
                vehicle_events: 1,
            }
        );
    }
}
