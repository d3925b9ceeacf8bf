//! Authentication against the remote service.
//!
//! Builds login requests from supplied credentials, environment fallbacks,
//! and the current sentry-key hash, and hands them to the transport.

mod login;

pub use login::{Authenticator, LoginOptions, LoginRequest};
