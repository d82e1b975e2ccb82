//! VAPID signing key provisioning.
//!
//! One P-256 key pair per process, generated lazily on first use and
//! persisted so restarts keep serving the same public key. Regenerating
//! the pair silently invalidates every browser subscription created
//! against the old public key, so the pair is never regenerated while
//! both artifacts are present on disk or once cached in memory. If either
//! artifact goes missing between restarts, a fresh pair is generated and
//! existing subscriptions are orphaned until clients re-subscribe.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use p256::SecretKey;
use rand::rngs::OsRng;

use crate::error::KeyError;

/// File name of the persisted private key (PKCS#8 PEM, unencrypted).
pub const PRIVATE_KEY_FILE: &str = "vapid_private.pem";

/// File name of the persisted public key (URL-safe unpadded base64 of the
/// 65-byte uncompressed SEC1 point).
pub const PUBLIC_KEY_FILE: &str = "vapid_public.txt";

/// A loaded VAPID key pair.
#[derive(Clone)]
pub struct VapidKeyPair {
    secret: SecretKey,
    public_key_b64: String,
}

impl VapidKeyPair {
    /// The public key in the form browsers expect for
    /// `applicationServerKey`.
    pub fn public_key_b64(&self) -> &str {
        &self.public_key_b64
    }

    /// ECDSA signing key for VAPID JWTs. Internal to the push subsystem.
    pub(crate) fn signing_key(&self) -> p256::ecdsa::SigningKey {
        p256::ecdsa::SigningKey::from(&self.secret)
    }
}

impl std::fmt::Debug for VapidKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeyPair")
            .field("public_key_b64", &self.public_key_b64)
            .finish_non_exhaustive()
    }
}

/// Lazily provisions and caches the process-wide VAPID key pair.
#[derive(Debug)]
pub struct VapidKeyProvider {
    private_key_path: PathBuf,
    public_key_path: PathBuf,
    cached: Mutex<Option<Arc<VapidKeyPair>>>,
}

impl VapidKeyProvider {
    /// Creates a provider rooted at `key_dir`. Nothing is read or
    /// generated until the first [`Self::key_pair`] call.
    pub fn new(key_dir: impl AsRef<Path>) -> Self {
        let dir = key_dir.as_ref();
        Self {
            private_key_path: dir.join(PRIVATE_KEY_FILE),
            public_key_path: dir.join(PUBLIC_KEY_FILE),
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached key pair, loading or generating it on first call.
    ///
    /// The generate-if-absent step is a check-then-act sequence guarded by
    /// the cache mutex, so concurrent first callers observe exactly one
    /// generation.
    pub fn key_pair(&self) -> Result<Arc<VapidKeyPair>, KeyError> {
        let mut cached = self.cached.lock().map_err(|_| KeyError::LockPoisoned)?;

        if let Some(pair) = cached.as_ref() {
            return Ok(pair.clone());
        }

        let pair = if self.private_key_path.exists() && self.public_key_path.exists() {
            self.load()?
        } else {
            self.generate_and_persist()?
        };

        let pair = Arc::new(pair);
        *cached = Some(pair.clone());
        Ok(pair)
    }

    /// Returns the public key string, provisioning the pair if needed.
    pub fn public_key(&self) -> Result<String, KeyError> {
        Ok(self.key_pair()?.public_key_b64().to_string())
    }

    fn load(&self) -> Result<VapidKeyPair, KeyError> {
        let pem = std::fs::read_to_string(&self.private_key_path)?;
        let secret =
            SecretKey::from_pkcs8_pem(&pem).map_err(|e| KeyError::Decode(e.to_string()))?;

        // The private key is authoritative; derive the public string from
        // it rather than trusting the text file.
        let public_key_b64 = encode_public_key(&secret);

        tracing::debug!(
            path = %self.private_key_path.display(),
            "loaded existing VAPID key pair"
        );

        Ok(VapidKeyPair {
            secret,
            public_key_b64,
        })
    }

    fn generate_and_persist(&self) -> Result<VapidKeyPair, KeyError> {
        if let Some(dir) = self.private_key_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let secret = SecretKey::random(&mut OsRng);
        let pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        let public_key_b64 = encode_public_key(&secret);

        std::fs::write(&self.private_key_path, pem.as_bytes())?;
        std::fs::write(&self.public_key_path, &public_key_b64)?;

        tracing::info!(
            path = %self.private_key_path.display(),
            "generated new VAPID key pair"
        );

        Ok(VapidKeyPair {
            secret,
            public_key_b64,
        })
    }
}

/// Uncompressed SEC1 point (0x04 ‖ x ‖ y), URL-safe base64 without padding.
fn encode_public_key(secret: &SecretKey) -> String {
    let point = secret.public_key().to_encoded_point(false);
    URL_SAFE_NO_PAD.encode(point.as_bytes())
}
