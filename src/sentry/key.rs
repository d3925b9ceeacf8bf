//! Sentry key material and its persisted form.
//!
//! [`SentryKey`] is the in-memory credential; [`KeyFile`] is what goes on
//! disk. The raw secret never serializes; only its base64 encoding under a
//! distinctly named field does.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{KilnError, KilnResult};

use super::UpdatePatch;

/// In-memory sentry key material.
///
/// Updates replace the whole key rather than mutating it, so holders of a
/// previous key keep observing the prior state, and the cached hash can
/// never go stale.
#[derive(Debug, Default)]
pub struct SentryKey {
    /// Filename the remote service knows this key by.
    pub remote_filename: Option<String>,
    /// The raw shared secret.
    pub shared_secret: Vec<u8>,
    /// When the key was last updated.
    pub updated_at: Option<DateTime<Utc>>,
    /// Provenance fields from the persisted file, preserved verbatim.
    pub extra: Map<String, Value>,
    /// Content hash of `shared_secret`, computed at most once per key.
    hash: OnceCell<[u8; 32]>,
}

impl SentryKey {
    /// Build a key around freshly decoded secret bytes.
    pub fn new(shared_secret: Vec<u8>) -> Self {
        Self {
            shared_secret,
            ..Self::default()
        }
    }

    /// Whether any secret material is present.
    pub fn has_secret(&self) -> bool {
        !self.shared_secret.is_empty()
    }

    /// SHA-256 digest of the secret.
    ///
    /// Computed on first call and cached for the lifetime of this key
    /// object; repeated calls return bit-identical output.
    pub fn secret_hash(&self) -> [u8; 32] {
        *self.hash.get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(&self.shared_secret);
            hasher.finalize().into()
        })
    }

    /// Apply `patch` to a copy of the secret, producing the successor key.
    ///
    /// The current key is left untouched. The write is bounded by the end
    /// of the secret (a patch never grows the buffer); the number of bytes
    /// that land must equal the patch's declared length, or the patch is
    /// rejected.
    pub fn with_patch(&self, patch: &UpdatePatch, time: DateTime<Utc>) -> KilnResult<SentryKey> {
        let mut buf = self.shared_secret.clone();
        let copied = if patch.offset < buf.len() {
            let end = usize::min(patch.offset + patch.bytes.len(), buf.len());
            let n = end - patch.offset;
            buf[patch.offset..end].copy_from_slice(&patch.bytes[..n]);
            n
        } else {
            0
        };
        if copied != patch.expected_len {
            return Err(KilnError::WriteMismatch {
                expected: patch.expected_len,
                actual: copied,
            });
        }
        Ok(SentryKey {
            remote_filename: patch
                .remote_filename
                .clone()
                .or_else(|| self.remote_filename.clone()),
            shared_secret: buf,
            updated_at: Some(time),
            extra: self.extra.clone(),
            hash: OnceCell::new(),
        })
    }
}

/// Persisted form of a sentry key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyFile {
    /// Base64 encoding of the shared secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret_base64: Option<String>,
    /// Filename the remote service knows this key by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_filename: Option<String>,
    /// When the key was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Any other fields found in the file, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KeyFile {
    /// Decode into an in-memory key.
    pub fn into_key(self) -> KilnResult<SentryKey> {
        let shared_secret = match self.shared_secret_base64 {
            Some(b64) => BASE64.decode(b64.as_bytes()).map_err(|e| {
                KilnError::Validation(format!("shared_secret_base64 is not valid base64: {}", e))
            })?,
            None => Vec::new(),
        };
        Ok(SentryKey {
            remote_filename: self.remote_filename,
            shared_secret,
            updated_at: self.updated_at,
            extra: self.extra,
            hash: OnceCell::new(),
        })
    }

    /// Encode a key for persistence.
    pub fn from_key(key: &SentryKey) -> Self {
        Self {
            shared_secret_base64: key
                .has_secret()
                .then(|| BASE64.encode(&key.shared_secret)),
            remote_filename: key.remote_filename.clone(),
            updated_at: key.updated_at,
            extra: key.extra.clone(),
        }
    }
}
