//! Per-event-name redaction of logged payloads.
//!
//! A redactor decides what, if anything, gets logged for an event: a
//! replacement summary, nothing at all, or the raw arguments. Redactors are
//! resolved by a static per-name lookup built at attach time.

use std::collections::HashMap;

use serde_json::Value;

use super::EventRecord;

/// Outcome of running a redactor over a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Redaction {
    /// Log this summary value instead of the raw arguments.
    Replace(Value),
    /// Log nothing for this event.
    Suppress,
    /// Log the raw arguments unchanged.
    PassThrough,
}

/// A per-event-name redaction function.
pub type Redactor = Box<dyn Fn(&EventRecord) -> Redaction + Send + Sync>;

/// Static mapping from event name to redactor.
///
/// Events without an entry pass through unredacted.
#[derive(Default)]
pub struct RedactorMap {
    by_name: HashMap<String, Redactor>,
}

impl RedactorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `redactor` for `name`, replacing any previous entry.
    pub fn with(
        mut self,
        name: impl Into<String>,
        redactor: impl Fn(&EventRecord) -> Redaction + Send + Sync + 'static,
    ) -> Self {
        self.by_name.insert(name.into(), Box::new(redactor));
        self
    }

    /// Look up the redactor registered for `name`.
    pub fn get(&self, name: &str) -> Option<&Redactor> {
        self.by_name.get(name)
    }

    /// Run the redactor for `record`, defaulting to pass-through.
    pub fn redact(&self, record: &EventRecord) -> Redaction {
        match self.get(&record.name) {
            Some(redactor) => redactor(record),
            None => Redaction::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(name: &str, args: Vec<Value>) -> EventRecord {
        EventRecord {
            id: 0,
            channel: "session".to_string(),
            name: name.to_string(),
            time: Utc::now(),
            args,
            confirm: None,
        }
    }

    #[test]
    fn test_unregistered_name_passes_through() {
        let map = RedactorMap::new();
        let outcome = map.redact(&record("connected", vec![]));
        assert_eq!(outcome, Redaction::PassThrough);
    }

    #[test]
    fn test_replace_outcome() {
        let map = RedactorMap::new().with("message", |_| Redaction::Replace(json!("[…]")));
        let outcome = map.redact(&record("message", vec![json!("secret payload")]));
        assert_eq!(outcome, Redaction::Replace(json!("[…]")));
    }

    #[test]
    fn test_suppress_outcome() {
        let map = RedactorMap::new().with("heartbeat", |_| Redaction::Suppress);
        let outcome = map.redact(&record("heartbeat", vec![]));
        assert_eq!(outcome, Redaction::Suppress);
    }

    #[test]
    fn test_redactor_sees_the_record() {
        let map = RedactorMap::new().with("servers", |ev| {
            let n = ev
                .args
                .first()
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            Redaction::Replace(json!(format!("n={}", n)))
        });
        let outcome = map.redact(&record("servers", vec![json!([1, 2, 3])]));
        assert_eq!(outcome, Redaction::Replace(json!("n=3")));
    }

    #[test]
    fn test_later_registration_wins() {
        let map = RedactorMap::new()
            .with("message", |_| Redaction::Suppress)
            .with("message", |_| Redaction::PassThrough);
        let outcome = map.redact(&record("message", vec![]));
        assert_eq!(outcome, Redaction::PassThrough);
    }
}
