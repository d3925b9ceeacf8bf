//! Multi-source event dispatcher.
//!
//! Fans in named events from independent sources, assigns each a durable
//! global id, records it in the append-only [`EventLog`], and emits one
//! diagnostic log line per event unless a redactor suppresses it. Ids are
//! strictly increasing and gap-free across all attached sources, giving a
//! single causal ordering for the whole process.

mod record;
mod redact;

pub use record::{EventLog, EventRecord};
pub use redact::{Redaction, Redactor, RedactorMap};

use std::collections::HashSet;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{KilnError, KilnResult};
use crate::transport::TransportEvent;

/// Buffer size for the recorded-event broadcast channel.
const RECORD_BUFFER: usize = 64;

/// Reference to a logged event: the record itself or its log id.
#[derive(Debug, Clone)]
pub enum EventRef {
    /// An id to resolve against the log.
    Id(u64),
    /// A record that is already in hand.
    Record(EventRecord),
}

impl From<u64> for EventRef {
    fn from(id: u64) -> Self {
        EventRef::Id(id)
    }
}

impl From<EventRecord> for EventRef {
    fn from(record: EventRecord) -> Self {
        EventRef::Record(record)
    }
}

/// Records events from any number of sources into one shared log.
///
/// Cheap to clone; all clones share the same log and id sequence.
#[derive(Clone)]
pub struct EventDispatcher {
    log: EventLog,
    records_tx: broadcast::Sender<EventRecord>,
}

impl EventDispatcher {
    /// Create a dispatcher with an empty log.
    pub fn new() -> Self {
        let (records_tx, _) = broadcast::channel(RECORD_BUFFER);
        Self {
            log: EventLog::new(),
            records_tx,
        }
    }

    /// The shared event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Subscribe to records as they are appended.
    ///
    /// Downstream consumers (e.g. credential-update routing) receive each
    /// record after it has been logged, so its id is already durable.
    pub fn subscribe_records(&self) -> broadcast::Receiver<EventRecord> {
        self.records_tx.subscribe()
    }

    /// Subscribe to every event in `names` on `source` under `channel`.
    ///
    /// Spawns a task that consumes the source until it closes. Each match
    /// is appended to the log and surfaced as one log line, subject to the
    /// redactors. A lagging source drops events from this subscription only;
    /// the global id sequence stays gap-free.
    pub fn attach(
        &self,
        channel: impl Into<String>,
        mut source: broadcast::Receiver<TransportEvent>,
        names: &[&str],
        redactors: RedactorMap,
    ) -> JoinHandle<()> {
        let channel = channel.into();
        let names: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if names.contains(&event.name) {
                            dispatcher.record(&channel, event, &redactors);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "event source lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Record one event under `channel` and surface its log line.
    ///
    /// Usable directly by in-process sources that do not go through
    /// [`EventDispatcher::attach`].
    pub fn record(
        &self,
        channel: &str,
        event: TransportEvent,
        redactors: &RedactorMap,
    ) -> EventRecord {
        let record = self
            .log
            .append(channel, event.name, event.args, event.confirm);
        match redactors.redact(&record) {
            Redaction::Suppress => {}
            Redaction::Replace(summary) => {
                info!(target: "kiln::dispatch", "{} !{}#{}! {}", record.channel, record.name, record.id, summary);
            }
            Redaction::PassThrough => {
                let args = serde_json::Value::Array(record.args.clone());
                info!(target: "kiln::dispatch", "{} !{}#{}! {}", record.channel, record.name, record.id, args);
            }
        }
        let _ = self.records_tx.send(record.clone());
        record
    }

    /// Resolve `ev` and require it to be named `name`.
    ///
    /// Enforces that downstream handlers receive the event type they
    /// expect.
    pub fn expect_named(&self, ev: impl Into<EventRef>, name: &str) -> KilnResult<EventRecord> {
        let record = match ev.into() {
            EventRef::Record(record) => Some(record),
            EventRef::Id(id) => self.log.get(id),
        };
        match record {
            Some(record) if record.name == name => Ok(record),
            _ => Err(KilnError::Validation(format!(
                "need an event named \"{}\" or its id",
                name
            ))),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
