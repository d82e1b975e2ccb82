//! Push notification subsystem for the Sentinel backend.
//!
//! Implements the in-memory push subscription store, the VAPID signing key
//! provisioner, the Web Push delivery transport (RFC 8030 delivery,
//! RFC 8291 `aes128gcm` payload encryption, RFC 8292 VAPID
//! authentication), and the alert dispatcher that fans an alert out to
//! every subscriber and prunes endpoints the push service reports as gone.
//!
//! The subscription payload handed to [`SubscriptionStore::subscribe`] is
//! treated as an opaque blob everywhere except inside the transport, which
//! is the single place that parses the provider-issued
//! `{endpoint, keys: {p256dh, auth}}` structure.

mod dispatcher;
mod error;
mod keys;
mod subscriptions;
mod webpush;

pub use dispatcher::AlertDispatcher;
pub use error::{KeyError, PushError};
pub use keys::{VapidKeyPair, VapidKeyProvider, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
pub use subscriptions::{StoredSubscription, SubscriptionStore};
pub use webpush::WebPushClient;
