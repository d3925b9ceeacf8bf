//! The sentry key store: load, patch, persist, confirm.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::dispatch::{EventDispatcher, EventRecord, EventRef};
use crate::error::{KilnError, KilnResult};
use crate::transport::{KeyConfirmation, UPDATE_MACHINE_AUTH};

use super::{KeyFile, SentryKey, UpdatePatch};

/// Credential readiness, as observed by login gating.
///
/// `Updated` behaves as `Loaded` for every subsequent operation; there is
/// no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No secret material in memory yet.
    Unloaded,
    /// Secret loaded from the persisted file.
    Loaded,
    /// Secret replaced by at least one confirmed remote update.
    Updated,
}

/// Owns the current sentry key and drives the update protocol.
///
/// The key is published wholesale behind an [`Arc`]: readers holding a
/// previous key never observe a half-updated buffer.
pub struct SentryKeyStore {
    filename: Option<PathBuf>,
    key: Option<Arc<SentryKey>>,
    state: KeyState,
}

impl SentryKeyStore {
    /// Create a store for the configured file, starting Unloaded.
    pub fn new(filename: Option<PathBuf>) -> Self {
        Self {
            filename,
            key: None,
            state: KeyState::Unloaded,
        }
    }

    /// Path of the persisted file, when persistence is configured.
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Current position in the Unloaded → Loaded → Updated lifecycle.
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Whether a load or update has completed.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, KeyState::Loaded | KeyState::Updated)
    }

    /// The current key, shared.
    pub fn current_key(&self) -> Option<Arc<SentryKey>> {
        self.key.clone()
    }

    /// Load the persisted key file, if one is configured and present.
    ///
    /// A configured-but-missing file is a valid "no credential yet"
    /// condition: the store stays Unloaded and only a login that needs the
    /// hash will fail. Unreadable files and malformed content are errors.
    pub async fn load(&mut self) -> KilnResult<KeyState> {
        let Some(path) = self.filename.clone() else {
            return Ok(self.state);
        };
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no sentry file yet");
                return Ok(self.state);
            }
            Err(e) => return Err(KilnError::Io { path, source: e }),
        };
        let raw = strip_bom(&raw);
        let file: KeyFile = serde_json::from_str(raw).map_err(|e| KilnError::Parse {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;
        self.key = Some(Arc::new(file.into_key()?));
        self.state = KeyState::Loaded;
        Ok(self.state)
    }

    /// Content hash of the current secret.
    ///
    /// Cached per key object; fails while no secret is loaded.
    pub fn hash(&self) -> KilnResult<[u8; 32]> {
        match &self.key {
            Some(key) if key.has_secret() => Ok(key.secret_hash()),
            _ => Err(KilnError::Validation(
                "sentry shared secret is not loaded".to_string(),
            )),
        }
    }

    /// Compute the successor key for an update event, without adopting it.
    ///
    /// The current key is not touched; adoption happens only in
    /// [`SentryKeyStore::persist_and_confirm`] after the rename succeeds.
    pub fn apply_patch(&self, record: &EventRecord) -> KilnResult<SentryKey> {
        let patch = UpdatePatch::from_record(record)?;
        match &self.key {
            Some(key) => key.with_patch(&patch, record.time),
            None => SentryKey::default().with_patch(&patch, record.time),
        }
    }

    /// Run the full update protocol for `ev`.
    ///
    /// Validate the event, compute the successor key, write it to a
    /// timestamped temp file, rename the temp file over the canonical path,
    /// adopt the new key in memory, then acknowledge through the event's
    /// confirmation handle. The rename ordering means the on-disk file is
    /// never observed half-written, and any failure before the rename
    /// leaves both memory and disk at the previous state.
    pub async fn persist_and_confirm(
        &mut self,
        dispatcher: &EventDispatcher,
        ev: impl Into<EventRef>,
    ) -> KilnResult<[u8; 32]> {
        let record = dispatcher.expect_named(ev, UPDATE_MACHINE_AUTH)?;
        let confirm = record.confirm.clone().ok_or_else(|| {
            KilnError::Validation("update event carries no confirmation handle".to_string())
        })?;
        let path = self.filename.clone().ok_or_else(|| {
            KilnError::Validation("no sentry file is configured".to_string())
        })?;

        let new_key = self.apply_patch(&record)?;

        let file = KeyFile::from_key(&new_key);
        let mut json = serde_json::to_string_pretty(&file)
            .map_err(|e| KilnError::Validation(format!("failed to encode key file: {}", e)))?;
        json.push('\n');

        let tmp = tmp_path(&path, record.time);
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| KilnError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| KilnError::Io {
                path: path.clone(),
                source: e,
            })?;

        let new_key = Arc::new(new_key);
        let hash = new_key.secret_hash();
        self.key = Some(new_key);
        self.state = KeyState::Updated;

        info!(hash = %hex::encode(hash), "confirming sentry update");
        confirm
            .confirm(KeyConfirmation {
                secret_hash: hash.to_vec(),
            })
            .await?;
        Ok(hash)
    }
}

/// Temp-file path for an update arriving at `time`.
fn tmp_path(path: &Path, time: DateTime<Utc>) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".upd-{}.tmp", time.timestamp_millis()));
    PathBuf::from(name)
}

/// Drop a leading UTF-8 byte-order marker, if present.
fn strip_bom(raw: &str) -> &str {
    raw.strip_prefix('\u{feff}').unwrap_or(raw)
}
