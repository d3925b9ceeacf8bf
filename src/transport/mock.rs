//! In-memory transport for testing and offline operation.
//!
//! Lets tests script inbound events and observe outbound login requests
//! without a network connection.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::auth::LoginRequest;
use crate::error::{KilnError, KilnResult};

use super::{Transport, TransportEvent};

/// Buffer size for the mock's broadcast channel.
const EVENT_BUFFER: usize = 64;

/// In-memory [`Transport`] implementation.
///
/// `connect` and `login` record their calls; [`MockTransport::emit`] injects
/// events as if the remote service had sent them.
#[derive(Clone)]
pub struct MockTransport {
    events: broadcast::Sender<TransportEvent>,
    login_requests: Arc<Mutex<Vec<LoginRequest>>>,
    connect_count: Arc<Mutex<usize>>,
    login_should_fail: Arc<Mutex<bool>>,
}

impl MockTransport {
    /// Create a disconnected mock.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            events,
            login_requests: Arc::new(Mutex::new(Vec::new())),
            connect_count: Arc::new(Mutex::new(0)),
            login_should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Inject an event as if the remote service had emitted it.
    ///
    /// Events emitted with no live subscriber are dropped, matching
    /// broadcast semantics.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    /// Configure whether `login` should fail.
    pub fn set_login_should_fail(&self, should_fail: bool) {
        *self.login_should_fail.lock().unwrap() = should_fail;
    }

    /// Login requests received so far, in order.
    pub fn login_requests(&self) -> Vec<LoginRequest> {
        self.login_requests.lock().unwrap().clone()
    }

    /// Number of `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        *self.connect_count.lock().unwrap()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> KilnResult<()> {
        *self.connect_count.lock().unwrap() += 1;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    async fn login(&self, request: LoginRequest) -> KilnResult<()> {
        if *self.login_should_fail.lock().unwrap() {
            return Err(KilnError::Transport("mock login failure".to_string()));
        }
        self.login_requests.lock().unwrap().push(request);
        Ok(())
    }
}
