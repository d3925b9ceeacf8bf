use std::sync::Arc;

use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kiln::auth::LoginOptions;
use kiln::config::Config;
use kiln::transport::MockTransport;
use kiln::Client;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --version flag before any initialization
    if std::env::args().any(|arg| arg == "--version") {
        println!("kiln {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiln=info")),
        )
        .init();

    let mut config = Config::from_env();

    // Prompt for the password when the account is configured but the
    // password is not; non-interactive runs leave both unset.
    if config.account.is_some() && config.password.is_none() {
        let password = rpassword::prompt_password("Password: ")?;
        if !password.is_empty() {
            config.password = Some(password);
        }
    }
    let have_credentials = config.account.is_some() && config.password.is_some();

    // The wire transport lives outside this crate; the in-process mock
    // stands in so the harness can run dry.
    let transport = Arc::new(MockTransport::new());
    let mut client = Client::new(config, transport);

    client.connect().await?;

    match client.load_sentry().await {
        Ok(_) => match client.store().hash() {
            Ok(hash) => info!(hash = %hex::encode(hash), "sentry file loaded"),
            Err(_) => info!("no sentry key on disk yet"),
        },
        Err(e) => warn!(error = %e, "failed to read sentry file"),
    }

    if have_credentials {
        client.login(&LoginOptions::new()).await?;
    } else {
        info!("no credentials configured; skipping logon");
    }

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    Ok(())
}
