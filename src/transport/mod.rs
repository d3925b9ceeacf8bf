//! Transport collaborator boundary.
//!
//! The network/session transport is an external collaborator: kiln only
//! calls [`Transport::connect`] and [`Transport::login`], and consumes the
//! named events the transport emits. The trait enables dependency injection
//! and mocking in tests; [`MockTransport`] is the in-process implementation.

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::auth::LoginRequest;
use crate::error::{KilnError, KilnResult};

/// Event name under which the remote service sends credential updates.
pub const UPDATE_MACHINE_AUTH: &str = "update_machine_auth";

/// A named notification emitted by the transport.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    /// Event name, e.g. `connected` or `update_machine_auth`.
    pub name: String,
    /// Ordered raw arguments as the transport delivered them.
    pub args: Vec<Value>,
    /// Capability to acknowledge a credential update, when the event
    /// carries one.
    pub confirm: Option<ConfirmHandle>,
}

impl TransportEvent {
    /// Create an event with no confirmation capability.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            confirm: None,
        }
    }

    /// Attach a confirmation capability.
    pub fn with_confirm(mut self, confirm: ConfirmHandle) -> Self {
        self.confirm = Some(confirm);
        self
    }
}

/// Message acknowledging a locally applied credential update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfirmation {
    /// Digest of the secret after the update.
    pub secret_hash: Vec<u8>,
}

/// Cloneable capability for completing the update handshake.
///
/// Carried by `update_machine_auth` events; sending through it tells the
/// remote service the patch was applied and persisted locally.
#[derive(Clone)]
pub struct ConfirmHandle {
    tx: mpsc::Sender<KeyConfirmation>,
}

impl ConfirmHandle {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<KeyConfirmation>) -> Self {
        Self { tx }
    }

    /// Create a handle plus the receiving end the transport listens on.
    pub fn channel() -> (Self, mpsc::Receiver<KeyConfirmation>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Complete the handshake.
    pub async fn confirm(&self, msg: KeyConfirmation) -> KilnResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| KilnError::Transport("confirmation channel closed".to_string()))
    }
}

impl std::fmt::Debug for ConfirmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConfirmHandle")
    }
}

/// Trait for the session transport.
///
/// Implementations maintain the wire protocol to the remote service,
/// multiplex its messages, and surface them as [`TransportEvent`]s on a
/// broadcast channel. Multiple subscribers can exist simultaneously.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish (or re-establish) the session with the remote service.
    async fn connect(&self) -> KilnResult<()>;

    /// Subscribe to the transport's named event stream.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Hand a fully built login request to the remote service.
    async fn login(&self, request: LoginRequest) -> KilnResult<()>;
}
