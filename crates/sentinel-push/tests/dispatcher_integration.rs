//! Dispatcher integration tests against a throwaway local push service.
//!
//! The real transport delivers to a local axum server that answers like a
//! browser push service (201 accepted, 410 gone, 500 flaky), so these
//! tests exercise the full encrypt → sign → POST → classify → prune path.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sentinel_push::{
    AlertDispatcher, SubscriptionStore, VapidKeyProvider, WebPushClient, PRIVATE_KEY_FILE,
    PUBLIC_KEY_FILE,
};
use sentinel_types::EventKind;

/// One recorded delivery attempt at the fake push service.
#[derive(Debug, Clone)]
struct Hit {
    path: String,
    authorization: Option<String>,
    content_encoding: Option<String>,
    ttl: Option<String>,
    body_len: usize,
}

#[derive(Clone, Default)]
struct Hits(Arc<Mutex<Vec<Hit>>>);

impl Hits {
    fn record(&self, path: &str, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        self.0.lock().expect("hits lock").push(Hit {
            path: path.to_string(),
            authorization: header("authorization"),
            content_encoding: header("content-encoding"),
            ttl: header("ttl"),
            body_len: body.len(),
        });
    }

    fn all(&self) -> Vec<Hit> {
        self.0.lock().expect("hits lock").clone()
    }

    fn count_for(&self, path: &str) -> usize {
        self.all().iter().filter(|h| h.path == path).count()
    }
}

async fn start_push_service() -> (SocketAddr, Hits) {
    let hits = Hits::default();

    async fn ok_handler(
        State(hits): State<Hits>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        hits.record("/push/ok", &headers, &body);
        StatusCode::CREATED
    }
    async fn gone_handler(
        State(hits): State<Hits>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        hits.record("/push/gone", &headers, &body);
        StatusCode::GONE
    }
    async fn flaky_handler(
        State(hits): State<Hits>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> StatusCode {
        hits.record("/push/flaky", &headers, &body);
        StatusCode::INTERNAL_SERVER_ERROR
    }

    let app = Router::new()
        .route("/push/ok", post(ok_handler))
        .route("/push/gone", post(gone_handler))
        .route("/push/flaky", post(flaky_handler))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind push service");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("push service error");
    });

    (addr, hits)
}

/// A subscription payload with real P-256 key material, as a browser
/// would produce it.
fn subscription_json(endpoint: &str) -> String {
    let secret = SecretKey::random(&mut OsRng);
    let p256dh =
        URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false).as_bytes());
    let mut auth = [0u8; 16];
    OsRng.fill_bytes(&mut auth);

    serde_json::json!({
        "endpoint": endpoint,
        "keys": { "p256dh": p256dh, "auth": URL_SAFE_NO_PAD.encode(auth) }
    })
    .to_string()
}

fn dispatcher_with(
    key_dir: &std::path::Path,
    subscriptions: Arc<SubscriptionStore>,
) -> AlertDispatcher {
    let keys = Arc::new(VapidKeyProvider::new(key_dir));
    let client = WebPushClient::new("admin@example.com", Duration::from_secs(2), 3600)
        .expect("client should build");
    AlertDispatcher::new(subscriptions, keys, client)
}

#[tokio::test]
async fn gone_endpoint_is_removed_after_sweep_others_retained() {
    let (addr, hits) = start_push_service().await;
    let subscriptions = Arc::new(SubscriptionStore::new());

    let ok_endpoint = format!("http://{addr}/push/ok");
    let gone_endpoint = format!("http://{addr}/push/gone");
    let flaky_endpoint = format!("http://{addr}/push/flaky");
    for endpoint in [&ok_endpoint, &gone_endpoint, &flaky_endpoint] {
        subscriptions.subscribe(endpoint, &subscription_json(endpoint), "anonymous");
    }

    let key_dir = tempfile::tempdir().expect("tempdir");
    let dispatcher = dispatcher_with(key_dir.path(), subscriptions.clone());

    dispatcher
        .send_alert(EventKind::UnknownFaceDetected, "", Some(7))
        .await;

    // The gone endpoint was swept once, then unsubscribed.
    assert_eq!(subscriptions.len(), 2);
    assert_eq!(hits.count_for("/push/gone"), 1);
    assert_eq!(hits.count_for("/push/ok"), 1);
    assert_eq!(hits.count_for("/push/flaky"), 1);

    // On the next alert the gone endpoint gets no further attempts; the
    // transient-failure endpoint is retried.
    dispatcher
        .send_alert(EventKind::LoiteringDetected, "side gate", None)
        .await;

    assert_eq!(hits.count_for("/push/gone"), 1);
    assert_eq!(hits.count_for("/push/ok"), 2);
    assert_eq!(hits.count_for("/push/flaky"), 2);
    assert_eq!(subscriptions.len(), 2);
}

#[tokio::test]
async fn zero_subscribers_performs_no_signing_work() {
    let subscriptions = Arc::new(SubscriptionStore::new());
    let key_dir = tempfile::tempdir().expect("tempdir");
    let dispatcher = dispatcher_with(key_dir.path(), subscriptions);

    dispatcher
        .send_alert(EventKind::UnknownFaceDetected, "", Some(1))
        .await;

    // The key provider was never invoked: lazy first-call generation
    // would have created both artifacts.
    assert!(!key_dir.path().join(PRIVATE_KEY_FILE).exists());
    assert!(!key_dir.path().join(PUBLIC_KEY_FILE).exists());
}

#[tokio::test]
async fn unmapped_event_kind_is_a_silent_noop() {
    let (addr, hits) = start_push_service().await;
    let subscriptions = Arc::new(SubscriptionStore::new());
    let endpoint = format!("http://{addr}/push/ok");
    subscriptions.subscribe(&endpoint, &subscription_json(&endpoint), "anonymous");

    let key_dir = tempfile::tempdir().expect("tempdir");
    let dispatcher = dispatcher_with(key_dir.path(), subscriptions.clone());

    dispatcher
        .send_alert(EventKind::PersonEntered, "lobby", Some(2))
        .await;

    assert!(hits.all().is_empty(), "non-alert kinds must not dispatch");
    assert_eq!(subscriptions.len(), 1);
}

#[tokio::test]
async fn delivery_request_carries_webpush_envelope() {
    let (addr, hits) = start_push_service().await;
    let subscriptions = Arc::new(SubscriptionStore::new());
    let endpoint = format!("http://{addr}/push/ok");
    subscriptions.subscribe(&endpoint, &subscription_json(&endpoint), "anonymous");

    let key_dir = tempfile::tempdir().expect("tempdir");
    let dispatcher = dispatcher_with(key_dir.path(), subscriptions);

    dispatcher
        .send_alert(EventKind::VehicleEntered, "", Some(42))
        .await;

    let all = hits.all();
    assert_eq!(all.len(), 1);
    let hit = &all[0];

    let authorization = hit.authorization.as_deref().expect("authorization header");
    assert!(authorization.starts_with("vapid t="), "VAPID scheme");
    assert!(authorization.contains(", k="), "public key parameter");
    assert_eq!(hit.content_encoding.as_deref(), Some("aes128gcm"));
    assert_eq!(hit.ttl.as_deref(), Some("3600"));
    // aes128gcm header (86 bytes) plus ciphertext and tag.
    assert!(hit.body_len > 86, "body must carry an encrypted record");
}

#[tokio::test]
async fn malformed_stored_payload_is_retained_not_removed() {
    let subscriptions = Arc::new(SubscriptionStore::new());
    subscriptions.subscribe("https://push.example/abc", "not json at all", "anonymous");

    let key_dir = tempfile::tempdir().expect("tempdir");
    let dispatcher = dispatcher_with(key_dir.path(), subscriptions.clone());

    dispatcher
        .send_alert(EventKind::UnknownFaceDetected, "", None)
        .await;

    // A malformed payload is a delivery failure, not proof the endpoint
    // is gone; the subscription stays for a future (renewed) attempt.
    assert_eq!(subscriptions.len(), 1);
}
