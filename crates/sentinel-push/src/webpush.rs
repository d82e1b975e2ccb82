//! Web Push delivery transport.
//!
//! One delivery attempt per call: encrypt the message for the subscriber
//! (RFC 8291 `aes128gcm`), authenticate the request with a VAPID JWT
//! (RFC 8292, ES256), and POST to the subscription endpoint (RFC 8030).
//! This module is the only place the opaque subscription payload is
//! parsed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::Signature;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;

use crate::error::PushError;
use crate::keys::VapidKeyPair;
use crate::subscriptions::endpoint_prefix;

/// Validity window for VAPID JWTs. RFC 8292 caps this at 24 hours.
const VAPID_JWT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Encrypted-content record size advertised in the `aes128gcm` header.
/// Alert payloads are small, so a single record always suffices.
const RECORD_SIZE: u32 = 4096;

/// The provider-issued subscription structure. Parsed only here.
#[derive(Debug, Deserialize)]
struct SubscriptionInfo {
    endpoint: String,
    keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
struct SubscriptionKeys {
    /// Subscriber's P-256 public key (65-byte uncompressed point, base64url).
    p256dh: String,
    /// Subscriber's 16-byte authentication secret (base64url).
    auth: String,
}

/// HTTP client for push delivery with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct WebPushClient {
    http: reqwest::Client,
    contact: String,
    ttl_secs: u32,
}

impl WebPushClient {
    /// Creates a client. `contact` becomes the `sub` VAPID claim
    /// (`mailto:<contact>`); `timeout` bounds every delivery attempt so a
    /// slow push service cannot stall a dispatch sweep; `ttl_secs` is the
    /// message retention the push service is asked to honor.
    pub fn new(
        contact: impl Into<String>,
        timeout: Duration,
        ttl_secs: u32,
    ) -> Result<Self, PushError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            contact: contact.into(),
            ttl_secs,
        })
    }

    /// Attempts one signed, encrypted delivery to a subscriber.
    ///
    /// # Errors
    ///
    /// [`PushError::EndpointGone`] when the service answers 404/410 —
    /// the caller should drop the subscription. Any other error means the
    /// subscription may still be valid.
    pub async fn deliver(
        &self,
        subscription_payload: &str,
        message: &[u8],
        keys: &VapidKeyPair,
    ) -> Result<(), PushError> {
        let subscription: SubscriptionInfo = serde_json::from_str(subscription_payload)
            .map_err(|e| PushError::InvalidSubscription(e.to_string()))?;

        let body = encrypt_payload(message, &subscription.keys.p256dh, &subscription.keys.auth)?;
        let audience = endpoint_origin(&subscription.endpoint)?;
        let jwt = sign_vapid_jwt(&audience, &self.contact, keys)?;

        let response = self
            .http
            .post(&subscription.endpoint)
            .header(
                "Authorization",
                format!("vapid t={}, k={}", jwt, keys.public_key_b64()),
            )
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("TTL", self.ttl_secs.to_string())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                endpoint = endpoint_prefix(&subscription.endpoint),
                "push delivered"
            );
            return Ok(());
        }

        match status.as_u16() {
            404 | 410 => Err(PushError::EndpointGone),
            code => Err(PushError::Service(code)),
        }
    }
}

/// Encrypts `message` for a subscriber per RFC 8291 (`aes128gcm`).
///
/// Output layout: `salt(16) ‖ record_size(4) ‖ key_id_len(1) ‖
/// ephemeral_public(65) ‖ ciphertext`. The message plus the `0x02`
/// last-record delimiter forms a single record.
fn encrypt_payload(message: &[u8], p256dh_b64: &str, auth_b64: &str) -> Result<Vec<u8>, PushError> {
    let ua_public_bytes = decode_b64(p256dh_b64)
        .map_err(|e| PushError::InvalidSubscription(format!("p256dh: {e}")))?;
    let auth_secret =
        decode_b64(auth_b64).map_err(|e| PushError::InvalidSubscription(format!("auth: {e}")))?;
    if auth_secret.len() != 16 {
        return Err(PushError::InvalidSubscription(format!(
            "auth secret must be 16 bytes, got {}",
            auth_secret.len()
        )));
    }

    let ua_public = PublicKey::from_sec1_bytes(&ua_public_bytes)
        .map_err(|e| PushError::InvalidSubscription(format!("p256dh: {e}")))?;
    // Normalize to the uncompressed form for the key-derivation info
    // block regardless of how the browser encoded it.
    let ua_point = ua_public.to_encoded_point(false);

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let as_point = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(&ua_public);

    // IKM = HKDF-Expand(HKDF-Extract(auth_secret, ecdh_secret),
    //                   "WebPush: info" ‖ 0x00 ‖ ua_public ‖ as_public, 32)
    let mut info = Vec::with_capacity(14 + 65 + 65);
    info.extend_from_slice(b"WebPush: info\0");
    info.extend_from_slice(ua_point.as_bytes());
    info.extend_from_slice(as_point.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&auth_secret), shared.raw_secret_bytes().as_slice());
    let mut ikm = [0u8; 32];
    hk.expand(&info, &mut ikm)
        .map_err(|e| PushError::Crypto(e.to_string()))?;

    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);

    let hk = Hkdf::<Sha256>::new(Some(&salt), &ikm);
    let mut cek = [0u8; 16];
    hk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(|e| PushError::Crypto(e.to_string()))?;
    let mut nonce_bytes = [0u8; 12];
    hk.expand(b"Content-Encoding: nonce\0", &mut nonce_bytes)
        .map_err(|e| PushError::Crypto(e.to_string()))?;

    let mut record = Vec::with_capacity(message.len() + 1);
    record.extend_from_slice(message);
    record.push(0x02);

    let cipher =
        Aes128Gcm::new_from_slice(&cek).map_err(|e| PushError::Crypto(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), record.as_slice())
        .map_err(|e| PushError::Crypto(e.to_string()))?;

    let key_id = as_point.as_bytes();
    let mut body = Vec::with_capacity(16 + 4 + 1 + key_id.len() + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(key_id.len() as u8);
    body.extend_from_slice(key_id);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

/// Signs the VAPID JWT (ES256) for a push-service origin.
fn sign_vapid_jwt(
    audience: &str,
    contact: &str,
    keys: &VapidKeyPair,
) -> Result<String, PushError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"ES256"}"#);

    let expires = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .saturating_add(VAPID_JWT_TTL)
        .as_secs();

    let claims = serde_json::json!({
        "aud": audience,
        "exp": expires,
        "sub": format!("mailto:{contact}"),
    });
    let claims_json =
        serde_json::to_vec(&claims).map_err(|e| PushError::Crypto(e.to_string()))?;
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);

    let signing_input = format!("{header}.{claims_b64}");
    let signature: Signature = keys.signing_key().sign(signing_input.as_bytes());

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// The `aud` claim is the origin of the push endpoint.
fn endpoint_origin(endpoint: &str) -> Result<String, PushError> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| PushError::InvalidSubscription(format!("endpoint: {e}")))?;
    match parsed.origin() {
        url::Origin::Tuple(..) => Ok(parsed.origin().ascii_serialization()),
        url::Origin::Opaque(_) => Err(PushError::InvalidSubscription(format!(
            "endpoint has no origin: {}",
            endpoint_prefix(endpoint)
        ))),
    }
}

/// Browsers emit unpadded base64url, but some clients pad or use the
/// standard alphabet; accept both.
fn decode_b64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = value.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
}
