//! Top-level wiring of dispatcher, key store, authenticator, and transport.
//!
//! One [`Client`] is constructed at startup and owns every core component;
//! nothing in the crate reaches for ambient global state.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::auth::{Authenticator, LoginOptions};
use crate::config::Config;
use crate::dispatch::{EventDispatcher, EventRecord, Redaction, RedactorMap};
use crate::error::KilnResult;
use crate::sentry::{KeyState, SentryKeyStore};
use crate::transport::{Transport, UPDATE_MACHINE_AUTH};

/// Session-level events worth recording.
const SESSION_EVENTS: &[&str] = &[
    "connected",
    "error",
    "logged_off",
    "logon_response",
    "servers",
    "message",
];

/// Events that drive the credential-update protocol.
const AUTH_EVENTS: &[&str] = &[UPDATE_MACHINE_AUTH];

/// The assembled kiln session client.
pub struct Client {
    dispatcher: EventDispatcher,
    store: SentryKeyStore,
    authenticator: Authenticator,
    transport: Arc<dyn Transport>,
    records_rx: Option<broadcast::Receiver<EventRecord>>,
    attached: bool,
}

impl Client {
    /// Assemble a client over `transport` using the process configuration.
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = EventDispatcher::new();
        let store = SentryKeyStore::new(config.sentry_file.clone());
        let authenticator = Authenticator::new(config);
        Self {
            dispatcher,
            store,
            authenticator,
            transport,
            records_rx: None,
            attached: false,
        }
    }

    /// The shared event dispatcher.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// The sentry key store.
    pub fn store(&self) -> &SentryKeyStore {
        &self.store
    }

    /// Attach the transport's event stream and connect.
    ///
    /// Attachment happens once; reconnecting reuses the existing
    /// subscriptions.
    pub async fn connect(&mut self) -> KilnResult<()> {
        if !self.attached {
            self.records_rx = Some(self.dispatcher.subscribe_records());

            let session_redactors = RedactorMap::new()
                .with("message", |_| Redaction::Replace(json!("[…]")))
                .with("servers", |ev| {
                    let n = ev
                        .args
                        .first()
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    Redaction::Replace(json!(format!("n={}", n)))
                });
            self.dispatcher.attach(
                "session",
                self.transport.subscribe(),
                SESSION_EVENTS,
                session_redactors,
            );

            let auth_redactors = RedactorMap::new()
                .with(UPDATE_MACHINE_AUTH, |_| Redaction::Replace(json!("[…]")));
            self.dispatcher.attach(
                "auth",
                self.transport.subscribe(),
                AUTH_EVENTS,
                auth_redactors,
            );

            self.attached = true;
        }
        self.transport.connect().await
    }

    /// Load the persisted sentry key, if configured and present.
    pub async fn load_sentry(&mut self) -> KilnResult<KeyState> {
        self.store.load().await
    }

    /// Build a login request and hand it to the transport.
    pub async fn login(&self, opts: &LoginOptions) -> KilnResult<()> {
        self.authenticator
            .login(opts, &self.store, self.transport.as_ref())
            .await
    }

    /// Route recorded events until the stream ends.
    ///
    /// Credential-update events are driven through the store one cycle at a
    /// time: the next update is not picked up until the previous cycle's
    /// confirmation has settled. Update failures are surfaced in the log
    /// and leave the store at its last-known-good state; retrying is the
    /// operator's call.
    pub async fn run(&mut self) -> KilnResult<()> {
        let mut records = match self.records_rx.take() {
            Some(rx) => rx,
            None => self.dispatcher.subscribe_records(),
        };
        loop {
            match records.recv().await {
                Ok(record) if record.name == UPDATE_MACHINE_AUTH => {
                    match self
                        .store
                        .persist_and_confirm(&self.dispatcher, record.id)
                        .await
                    {
                        Ok(hash) => {
                            info!(hash = %hex::encode(hash), "sentry key updated");
                        }
                        Err(e) => {
                            error!(error = %e, "sentry update failed");
                        }
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "record stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        Ok(())
    }
}
