//! Environment-derived configuration.
//!
//! Account name, password, and the sentry file path are resolved once at
//! construction and fixed for the process lifetime. Setting
//! `KILN_SENTRY_FILE=.` explicitly disables sentry persistence.

use std::env;
use std::path::PathBuf;

/// Environment variable holding the account name.
pub const ENV_USER: &str = "KILN_USER";

/// Environment variable holding the password.
pub const ENV_PSWD: &str = "KILN_PSWD";

/// Environment variable overriding the sentry file path (`.` disables it).
pub const ENV_SENTRY_FILE: &str = "KILN_SENTRY_FILE";

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Account name used for login when no explicit one is supplied.
    pub account: Option<String>,
    /// Password used for login when no explicit one is supplied.
    pub password: Option<String>,
    /// Path of the persisted sentry file, if persistence is enabled.
    pub sentry_file: Option<PathBuf>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the account name.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the sentry file path.
    pub fn with_sentry_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sentry_file = Some(path.into());
        self
    }

    /// Build configuration from the environment.
    ///
    /// The sentry path falls back to the per-account default location when
    /// the override variable is unset.
    pub fn from_env() -> Self {
        let account = non_empty_var(ENV_USER);
        let password = non_empty_var(ENV_PSWD);
        let sentry_file = resolve_sentry_file(non_empty_var(ENV_SENTRY_FILE), account.as_deref());
        Self {
            account,
            password,
            sentry_file,
        }
    }
}

/// Resolve the sentry file path from an explicit override and the account.
///
/// An override of `.` disables persistence entirely. With no override, the
/// default is `<config-dir>/kiln/sentry-files/<account>@<hostname>.json`.
pub fn resolve_sentry_file(over: Option<String>, account: Option<&str>) -> Option<PathBuf> {
    match over.as_deref() {
        Some(".") => None,
        Some(path) => Some(PathBuf::from(path)),
        None => account.and_then(default_sentry_file),
    }
}

/// The default per-account sentry file location.
fn default_sentry_file(account: &str) -> Option<PathBuf> {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_lowercase())
        .unwrap_or_else(|_| "unknown".to_string());
    let dir = dirs::config_dir()?;
    Some(
        dir.join("kiln")
            .join("sentry-files")
            .join(format!("{}@{}.json", account, host)),
    )
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
