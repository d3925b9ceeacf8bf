//! Event records and the append-only event log.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::transport::ConfirmHandle;

/// A single entry in the process-wide event log.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Position in the log, assigned at insertion and never reused.
    pub id: u64,
    /// Channel the producing source was attached under.
    pub channel: String,
    /// Event name as emitted by the source.
    pub name: String,
    /// Wall-clock arrival time.
    pub time: DateTime<Utc>,
    /// Ordered raw arguments as delivered.
    pub args: Vec<Value>,
    /// Capability to acknowledge a credential update, when the event
    /// carried one.
    pub confirm: Option<ConfirmHandle>,
}

/// Append-only, process-lifetime log of every dispatched event.
///
/// Growth is unbounded for the process lifetime, trading a memory bound for
/// full auditability. Ids equal log positions, so they are strictly
/// increasing and gap-free across every attached source.
#[derive(Clone, Default)]
pub struct EventLog {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next id, and return the stored record.
    pub fn append(
        &self,
        channel: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Value>,
        confirm: Option<ConfirmHandle>,
    ) -> EventRecord {
        let mut records = self.records.lock().expect("event log lock poisoned");
        let record = EventRecord {
            id: records.len() as u64,
            channel: channel.into(),
            name: name.into(),
            time: Utc::now(),
            args,
            confirm,
        };
        records.push(record.clone());
        record
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.records.lock().expect("event log lock poisoned").len()
    }

    /// Whether the log is still empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the record with the given id.
    pub fn get(&self, id: u64) -> Option<EventRecord> {
        self.records
            .lock()
            .expect("event log lock poisoned")
            .get(id as usize)
            .cloned()
    }

    /// Copy of the full log in append order.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records.lock().expect("event log lock poisoned").clone()
    }
}
