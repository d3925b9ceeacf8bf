//! kiln: session client for a remote service with a rotating sentry-key
//! credential.
//!
//! The remote service proves device identity with a "sentry key": a secret
//! byte buffer it rotates by sending incremental binary patches. kiln keeps
//! an audit log of every transport event, applies and persists key patches
//! atomically, completes the confirmation handshake, and builds login
//! requests gated on credential readiness.

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod sentry;
pub mod transport;

pub use client::Client;
pub use config::Config;
pub use error::{KilnError, KilnResult};
