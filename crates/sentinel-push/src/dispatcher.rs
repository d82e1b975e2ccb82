//! Alert dispatch: template lookup, payload construction, subscriber
//! sweep, and self-healing removal of dead endpoints.

use std::sync::Arc;

use sentinel_types::EventKind;
use serde::Serialize;

use crate::error::PushError;
use crate::keys::VapidKeyProvider;
use crate::subscriptions::{endpoint_prefix, SubscriptionStore};
use crate::webpush::WebPushClient;

/// The notification body delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub title: String,
    pub body: String,
    pub url: String,
    pub tag: String,
    #[serde(rename = "eventId")]
    pub event_id: Option<i64>,
}

/// Sends alert notifications for alert-worthy events and prunes
/// subscriptions the push service reports as permanently gone.
pub struct AlertDispatcher {
    subscriptions: Arc<SubscriptionStore>,
    keys: Arc<VapidKeyProvider>,
    client: WebPushClient,
}

impl AlertDispatcher {
    pub fn new(
        subscriptions: Arc<SubscriptionStore>,
        keys: Arc<VapidKeyProvider>,
        client: WebPushClient,
    ) -> Self {
        Self {
            subscriptions,
            keys,
            client,
        }
    }

    /// Delivers one alert to every current subscriber.
    ///
    /// Kinds without an alert template are a silent no-op. With zero
    /// subscribers the dispatcher returns before touching the key
    /// provider, so no signing work (or first-call key generation)
    /// happens. Each subscriber gets exactly one delivery attempt;
    /// endpoints answering 404/410 are unsubscribed after the sweep,
    /// any other failure leaves the subscription in place. Never fails:
    /// delivery errors are logged, not propagated.
    pub async fn send_alert(&self, kind: EventKind, details: &str, event_id: Option<i64>) {
        let Some(template) = kind.alert_template() else {
            return;
        };

        if self.subscriptions.is_empty() {
            return;
        }

        let keys = match self.keys.key_pair() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("cannot send alert, signing key unavailable: {}", e);
                return;
            }
        };

        let body = if details.is_empty() {
            template.default_body.to_string()
        } else {
            details.to_string()
        };
        let url = match event_id {
            Some(id) => format!("/events?highlight={id}"),
            None => "/events".to_string(),
        };
        let payload = AlertPayload {
            title: template.title.to_string(),
            body,
            url,
            tag: format!("alert-{}", kind.as_str().to_lowercase()),
            event_id,
        };

        let data = match serde_json::to_vec(&payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("failed to serialize alert payload: {}", e);
                return;
            }
        };

        // Sweep a snapshot; collect expired endpoints and remove them only
        // after the sweep so iteration never observes its own removals.
        let mut expired = Vec::new();
        for subscription in self.subscriptions.snapshot() {
            match self
                .client
                .deliver(&subscription.payload, &data, &keys)
                .await
            {
                Ok(()) => {}
                Err(PushError::EndpointGone) => {
                    tracing::info!(
                        endpoint = endpoint_prefix(&subscription.endpoint),
                        "subscription expired, scheduling removal"
                    );
                    expired.push(subscription.endpoint);
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = endpoint_prefix(&subscription.endpoint),
                        "push delivery failed, subscription retained: {}",
                        e
                    );
                }
            }
        }

        for endpoint in expired {
            self.subscriptions.unsubscribe(&endpoint);
        }
    }
}
