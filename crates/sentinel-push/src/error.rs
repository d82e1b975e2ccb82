//! Error types for push delivery and key provisioning.

use thiserror::Error;

/// Errors from a single push delivery attempt.
///
/// Only [`PushError::EndpointGone`] causes the subscription to be removed;
/// every other variant leaves it in place for a future attempt.
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service reported the endpoint as permanently invalid
    /// (HTTP 404 or 410).
    #[error("subscription endpoint is gone")]
    EndpointGone,

    /// The push service answered with a non-success status other than
    /// 404/410 (rate limit, payload too large, server error, ...).
    #[error("push service returned status {0}")]
    Service(u16),

    /// Transport-level failure (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The stored subscription blob could not be parsed or carries
    /// unusable key material.
    #[error("invalid subscription payload: {0}")]
    InvalidSubscription(String),

    /// Payload encryption failed.
    #[error("payload encryption failed: {0}")]
    Crypto(String),

    /// The signing key pair could not be loaded or generated.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Errors from the VAPID key provisioner.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Failed to read or write a key artifact.
    #[error("failed to read or write key material: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted private key could not be decoded.
    #[error("failed to decode private key: {0}")]
    Decode(String),

    /// The provisioner's generation lock was poisoned.
    #[error("key provisioner lock poisoned")]
    LockPoisoned,
}
