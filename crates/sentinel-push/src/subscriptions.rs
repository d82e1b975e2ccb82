//! In-memory push subscription store.

use std::collections::HashMap;
use std::sync::RwLock;

/// One stored push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSubscription {
    /// Provider-issued endpoint URL. Acts as the primary key.
    pub endpoint: String,
    /// The raw subscription JSON as sent by the browser. Opaque to
    /// everything except the delivery transport.
    pub payload: String,
    /// Owner tag recorded at subscribe time.
    pub owner: String,
}

/// Endpoint-keyed map of push subscribers.
///
/// Process-lifetime state only; subscriptions do not survive a restart.
/// Uses `std::sync::RwLock` intentionally: all lock acquisitions are brief
/// HashMap operations that never span `.await` points, making a
/// synchronous lock safe and more efficient than `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    inner: RwLock<HashMap<String, StoredSubscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a subscription, overwriting any prior payload for the same
    /// endpoint (renewal). The only validation is a non-empty endpoint;
    /// malformed payloads surface later as delivery failures.
    ///
    /// Returns `false` when the endpoint is empty and nothing was stored.
    pub fn subscribe(&self, endpoint: &str, payload: &str, owner: &str) -> bool {
        if endpoint.is_empty() {
            return false;
        }

        let subscription = StoredSubscription {
            endpoint: endpoint.to_string(),
            payload: payload.to_string(),
            owner: owner.to_string(),
        };

        self.write_lock().insert(endpoint.to_string(), subscription);
        tracing::info!(owner = owner, "push subscription added");
        true
    }

    /// Removes a subscription. Returns whether it was present.
    pub fn unsubscribe(&self, endpoint: &str) -> bool {
        let removed = self.write_lock().remove(endpoint).is_some();
        if removed {
            tracing::info!(
                endpoint = endpoint_prefix(endpoint),
                "push subscription removed"
            );
        }
        removed
    }

    /// Clones the current subscriber list so dispatch iteration never
    /// interleaves with subscribe/unsubscribe writes.
    pub fn snapshot(&self) -> Vec<StoredSubscription> {
        self.read_lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, StoredSubscription>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panicked writer can only have left a fully-inserted or
                // fully-removed entry behind; recovering the map is safe.
                tracing::error!("subscription store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, StoredSubscription>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("subscription store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Truncated endpoint for log lines; full endpoints are long and carry
/// per-subscriber tokens.
pub(crate) fn endpoint_prefix(endpoint: &str) -> &str {
    endpoint.get(..50).unwrap_or(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_unsubscribe() {
        let store = SubscriptionStore::new();
        assert!(store.is_empty());

        assert!(store.subscribe("https://push.example/abc", "{\"endpoint\":\"x\"}", "anonymous"));
        assert_eq!(store.len(), 1);

        assert!(store.unsubscribe("https://push.example/abc"));
        assert!(!store.unsubscribe("https://push.example/abc"));
        assert!(store.is_empty());
    }

    #[test]
    fn resubscribe_overwrites_payload() {
        let store = SubscriptionStore::new();
        store.subscribe("https://push.example/abc", "old", "anonymous");
        store.subscribe("https://push.example/abc", "new", "anonymous");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload, "new");
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let store = SubscriptionStore::new();
        assert!(!store.subscribe("", "payload", "anonymous"));
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let store = SubscriptionStore::new();
        store.subscribe("https://push.example/a", "pa", "anonymous");

        let snapshot = store.snapshot();
        store.unsubscribe("https://push.example/a");

        assert_eq!(snapshot.len(), 1, "snapshot must not observe later writes");
        assert!(store.is_empty());
    }
}
