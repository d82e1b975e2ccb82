//! Ingestion API tests: authentication, validation, atomic batch
//! persistence, and query endpoints.

mod common;

use axum::http::StatusCode;
use common::{build_app, get, ingest_post, json_body, register_device, send};
use serde_json::json;

#[tokio::test]
async fn valid_batch_is_persisted_and_attributed() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    let response = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({
                "deviceId": "cam-1",
                "events": [
                    { "type": "PERSON_ENTERED", "timestamp": 1000, "duration": 100 },
                    { "type": "PERSON_EXITED", "timestamp": 1100, "duration": 200 },
                    { "type": "VEHICLE_ENTERED", "timestamp": 1200, "licensePlate": "AB-123" }
                ]
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 3);

    let listed = json_body(send(&app.router, get("/api/events")).await).await;
    let events = listed.as_array().expect("events list");
    assert_eq!(events.len(), 3);

    let mut ids: Vec<i64> = events
        .iter()
        .map(|e| e["id"].as_i64().expect("event id"))
        .collect();
    for event in events {
        assert_eq!(event["device_id"], "cam-1", "attributed to the authenticated device");
    }
    let original = ids.clone();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3, "ids must be distinct");
    // Listing is timestamp-descending, so ids come back newest first.
    assert_eq!(original, {
        let mut desc = ids.clone();
        desc.reverse();
        desc
    });
}

#[tokio::test]
async fn spoofed_device_id_is_overridden_by_credential() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;
    register_device(&app.router, "cam-2").await;

    let response = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({
                "deviceId": "cam-2",
                "events": [ { "type": "PERSON_ENTERED", "timestamp": 1000 } ]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let listed = json_body(send(&app.router, get("/api/events")).await).await;
    assert_eq!(listed[0]["device_id"], "cam-1", "body deviceId must not be trusted");
}

#[tokio::test]
async fn wrong_key_is_unauthorized_and_persists_nothing() {
    let app = build_app();
    register_device(&app.router, "cam-1").await;

    let response = send(
        &app.router,
        ingest_post(
            "WRONG",
            json!({
                "deviceId": "cam-1",
                "events": [ { "type": "UNKNOWN_FACE_DETECTED", "timestamp": 1000 } ]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let listed = json_body(send(&app.router, get("/api/events")).await).await;
    assert_eq!(listed.as_array().expect("events list").len(), 0);
}

#[tokio::test]
async fn missing_key_is_unauthorized() {
    let app = build_app();

    let response = send(
        &app.router,
        common::json_post(
            "/api/events",
            json!({ "events": [ { "type": "PERSON_ENTERED", "timestamp": 1 } ] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_device_key_stops_working() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    // Works while active.
    let ok = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({ "events": [ { "type": "PERSON_ENTERED", "timestamp": 1 } ] }),
        ),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let response = send(
        &app.router,
        axum::http::Request::builder()
            .method("PUT")
            .uri("/api/devices/cam-1/deactivate")
            .body(axum::body::Body::empty())
            .expect("request should build"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let denied = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({ "events": [ { "type": "PERSON_ENTERED", "timestamp": 2 } ] }),
        ),
    )
    .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_event_in_batch_rejects_before_persistence() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    let response = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({
                "events": [
                    { "type": "PERSON_ENTERED", "timestamp": 1000 },
                    { "type": "", "timestamp": 1100 }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listed = json_body(send(&app.router, get("/api/events")).await).await;
    assert_eq!(
        listed.as_array().expect("events list").len(),
        0,
        "a rejected batch must not partially persist"
    );
}

#[tokio::test]
async fn malformed_body_is_a_client_error() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    let response = send(
        &app.router,
        ingest_post(&api_key, json!({ "events": "not an array" })),
    )
    .await;
    assert!(
        response.status().is_client_error(),
        "malformed body must be a 4xx, got {}",
        response.status()
    );
}

#[tokio::test]
async fn empty_batch_is_accepted_with_zero_processed() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    let response = send(&app.router, ingest_post(&api_key, json!({ "events": [] }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn stats_endpoint_counts_groupings() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    // Timestamps far in the future are always >= today's midnight.
    let ts = sentinel_store::unix_now() + 1_000;
    let response = send(
        &app.router,
        ingest_post(
            &api_key,
            json!({
                "events": [
                    { "type": "PERSON_ENTERED", "timestamp": ts },
                    { "type": "EMPLOYEE_ARRIVED", "timestamp": ts + 1 },
                    { "type": "VEHICLE_ENTERED", "timestamp": ts + 2 },
                    { "type": "UNKNOWN_FACE_DETECTED", "timestamp": ts + 3 }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats = json_body(send(&app.router, get("/api/events/stats")).await).await;
    assert_eq!(stats["total_today"], 4);
    assert_eq!(stats["people_events"], 2);
    assert_eq!(stats["vehicle_events"], 1);

    let today = json_body(send(&app.router, get("/api/events/today")).await).await;
    assert_eq!(today.as_array().expect("today list").len(), 4);
}

#[tokio::test]
async fn event_type_filter_limits_results() {
    let app = build_app();
    let api_key = register_device(&app.router, "cam-1").await;

    send(
        &app.router,
        ingest_post(
            &api_key,
            json!({
                "events": [
                    { "type": "PERSON_ENTERED", "timestamp": 100 },
                    { "type": "PERSON_ENTERED", "timestamp": 200 },
                    { "type": "VEHICLE_ENTERED", "timestamp": 300 }
                ]
            }),
        ),
    )
    .await;

    let filtered = json_body(
        send(&app.router, get("/api/events?event_type=PERSON_ENTERED&limit=10")).await,
    )
    .await;
    let events = filtered.as_array().expect("events list");
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["event_type"] == "PERSON_ENTERED"));
}
