//! Login request construction and handoff.

use tracing::info;

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::sentry::SentryKeyStore;
use crate::transport::Transport;

/// A login request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account name.
    pub account_name: String,
    /// Password.
    pub password: String,
    /// One-time authentication code, when the service demanded one.
    pub auth_code: Option<String>,
    /// Digest of the sentry secret; present iff a sentry file is
    /// configured for this identity.
    pub sentry_hash: Option<Vec<u8>>,
}

impl LoginRequest {
    /// Field names and value lengths, for logging. Never the values.
    pub fn field_summary(&self) -> String {
        let mut parts = vec![
            format!("account_name=…×{}", self.account_name.len()),
            format!("password=…×{}", self.password.len()),
        ];
        if let Some(code) = &self.auth_code {
            parts.push(format!("auth_code=…×{}", code.len()));
        }
        if let Some(hash) = &self.sentry_hash {
            parts.push(format!("sentry_hash=…×{}", hash.len()));
        }
        parts.join(", ")
    }
}

/// Optional overrides for building a login request.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Account name, overriding the configured one.
    pub username: Option<String>,
    /// Password, overriding the configured one.
    pub password: Option<String>,
    /// One-time authentication code.
    pub auth_code: Option<String>,
}

impl LoginOptions {
    /// Use the configured credentials as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for retrying a login with just a one-time code.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            auth_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Set the account name.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the one-time code.
    pub fn with_auth_code(mut self, code: impl Into<String>) -> Self {
        self.auth_code = Some(code.into());
        self
    }
}

/// Builds login requests and hands them to the transport.
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: Config,
}

impl Authenticator {
    /// Create an authenticator over the process configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build a login request from `opts`, falling back to configured
    /// credentials and attaching the sentry hash when required.
    ///
    /// When a sentry file is configured, the shared secret must already be
    /// loaded; a configured-but-unloaded secret fails rather than sending a
    /// request with the hash silently missing.
    pub fn build_login_request(
        &self,
        opts: &LoginOptions,
        store: &SentryKeyStore,
    ) -> KilnResult<LoginRequest> {
        let account_name = opts
            .username
            .clone()
            .or_else(|| self.config.account.clone())
            .ok_or_else(|| {
                KilnError::Validation("no account name supplied or configured".to_string())
            })?;
        let password = opts
            .password
            .clone()
            .or_else(|| self.config.password.clone())
            .ok_or_else(|| {
                KilnError::Validation("no password supplied or configured".to_string())
            })?;

        let sentry_hash = match store.filename() {
            Some(_) => match store.hash() {
                Ok(hash) => Some(hash.to_vec()),
                Err(_) => {
                    return Err(KilnError::Validation(
                        "sentry file is configured but its shared secret is not (yet?) loaded"
                            .to_string(),
                    ))
                }
            },
            None => None,
        };

        Ok(LoginRequest {
            account_name,
            password,
            auth_code: opts.auth_code.clone(),
            sentry_hash,
        })
    }

    /// Build a request and hand it to the transport's login operation.
    ///
    /// Logs the request's field names and value lengths, never the values.
    pub async fn login(
        &self,
        opts: &LoginOptions,
        store: &SentryKeyStore,
        transport: &dyn Transport,
    ) -> KilnResult<()> {
        let request = self.build_login_request(opts, store)?;
        info!("logging on with {}", request.field_summary());
        transport.login(request).await
    }
}
