//! Sentry-key credential store.
//!
//! The remote service rotates a hardware-identity secret by sending
//! incremental byte-range patches. This module owns the key material,
//! loads it from the persisted file at startup, applies patches to a copy,
//! persists the result atomically (temp file + rename), and completes the
//! confirmation round-trip before the updated credential takes effect.

mod key;
mod patch;
mod store;

pub use key::{KeyFile, SentryKey};
pub use patch::UpdatePatch;
pub use store::{KeyState, SentryKeyStore};
