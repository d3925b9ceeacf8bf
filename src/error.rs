//! Unified error types for the kiln core.
//!
//! Four kinds cover the core operations: validation failures, persisted
//! sentry-file parse failures, IO failures annotated with the path involved,
//! and patch write mismatches. Failures crossing the transport boundary get
//! their own variant so callers can tell core failures from collaborator
//! failures.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for all kiln core operations.
#[derive(Debug, Error)]
pub enum KilnError {
    /// Malformed or missing required input.
    ///
    /// Covers non-finite patch offsets, lookups that resolve to the wrong
    /// event type, and logins attempted before a required credential is
    /// loaded.
    #[error("{0}")]
    Validation(String),

    /// The persisted sentry file is not well-formed.
    ///
    /// Carries the raw file content so the file can be diagnosed without
    /// re-reading it.
    #[error("failed to parse sentry file: {message}")]
    Parse {
        /// What the JSON parser objected to.
        message: String,
        /// The raw input that failed to parse.
        raw: String,
    },

    /// A read, write, or rename failed.
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// The file the operation was acting on.
        path: PathBuf,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// A patch promised one write length and delivered another.
    ///
    /// Signals a corrupted or adversarial update; the update is aborted
    /// rather than silently truncated.
    #[error("expected to write {expected} bytes but wrote {actual}")]
    WriteMismatch {
        /// Bytes the remote declared it was writing.
        expected: usize,
        /// Bytes that actually landed.
        actual: usize,
    },

    /// A failure reported by the transport collaborator.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Convenience result alias used throughout the crate.
pub type KilnResult<T> = Result<T, KilnError>;
