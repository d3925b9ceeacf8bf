//! Integration tests for event dispatch and login gating.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tempfile::TempDir;

use kiln::auth::{Authenticator, LoginOptions};
use kiln::config::Config;
use kiln::dispatch::{EventDispatcher, Redaction, RedactorMap};
use kiln::error::KilnError;
use kiln::sentry::SentryKeyStore;
use kiln::transport::{MockTransport, Transport, TransportEvent};
use kiln::Client;

/// N delivered events get ids exactly 0..N-1 in arrival order, regardless
/// of which channel produced them.
#[tokio::test]
async fn test_ids_are_gap_free_across_channels() {
    let dispatcher = EventDispatcher::new();
    let transport = MockTransport::new();
    let mut records = dispatcher.subscribe_records();

    dispatcher.attach(
        "session",
        transport.subscribe(),
        &["connected", "servers"],
        RedactorMap::new(),
    );
    dispatcher.attach(
        "auth",
        transport.subscribe(),
        &["logon_response"],
        RedactorMap::new(),
    );

    let names = ["connected", "logon_response", "servers", "logon_response"];
    for name in names {
        transport.emit(TransportEvent::new(name, vec![]));
        // Wait for the record so arrival order is deterministic across the
        // two attachment tasks.
        let record = tokio::time::timeout(Duration::from_secs(5), records.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.name, name);
    }

    let log = dispatcher.log().snapshot();
    assert_eq!(log.len(), names.len());
    for (position, record) in log.iter().enumerate() {
        assert_eq!(record.id, position as u64);
        assert_eq!(record.name, names[position]);
    }
}

/// Redactors shape what gets logged, not what gets recorded: the log keeps
/// raw arguments for every outcome.
#[tokio::test]
async fn test_redaction_never_touches_the_record() {
    let dispatcher = EventDispatcher::new();
    let redactors = RedactorMap::new()
        .with("message", |_| Redaction::Replace(json!("[…]")))
        .with("heartbeat", |_| Redaction::Suppress);

    let secret_payload = json!({"body": "do not log this"});
    dispatcher.record(
        "session",
        TransportEvent::new("message", vec![secret_payload.clone()]),
        &redactors,
    );
    dispatcher.record("session", TransportEvent::new("heartbeat", vec![]), &redactors);
    dispatcher.record(
        "session",
        TransportEvent::new("connected", vec![json!(true)]),
        &redactors,
    );

    let log = dispatcher.log().snapshot();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].args, vec![secret_payload]);
    assert_eq!(log[1].args, Vec::<serde_json::Value>::new());
    assert_eq!(log[2].args, vec![json!(true)]);
}

/// The login gate: configured sentry file + Unloaded store fails; after a
/// load the same call succeeds with a non-empty hash.
#[tokio::test]
async fn test_login_gating_against_store_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sentry.json");
    let body = json!({ "shared_secret_base64": BASE64.encode(b"device identity") });
    std::fs::write(&path, body.to_string()).unwrap();

    let config = Config::new()
        .with_account("someone")
        .with_password("hunter2")
        .with_sentry_file(path.clone());
    let authenticator = Authenticator::new(config);
    let mut store = SentryKeyStore::new(Some(path));

    let before = authenticator.build_login_request(&LoginOptions::new(), &store);
    assert!(matches!(before, Err(KilnError::Validation(_))));

    store.load().await.unwrap();
    let request = authenticator
        .build_login_request(&LoginOptions::new(), &store)
        .unwrap();
    assert!(!request.sentry_hash.unwrap().is_empty());
}

/// Without a configured sentry file, login proceeds with no hash at all;
/// a missing file is only an error once something needs it.
#[tokio::test]
async fn test_login_without_sentry_file() {
    let config = Config::new()
        .with_account("someone")
        .with_password("hunter2");
    let transport = MockTransport::new();
    let mut client = Client::new(config, Arc::new(transport.clone()));

    client.connect().await.unwrap();
    client.load_sentry().await.unwrap();
    client.login(&LoginOptions::new()).await.unwrap();

    let requests = transport.login_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].sentry_hash.is_none());
}

/// A configured-but-missing sentry file is tolerated at load time and only
/// rejected when a login demands the hash.
#[tokio::test]
async fn test_missing_sentry_file_fails_lazily() {
    let dir = TempDir::new().unwrap();
    let config = Config::new()
        .with_account("someone")
        .with_password("hunter2")
        .with_sentry_file(dir.path().join("not-written-yet.json"));
    let transport = MockTransport::new();
    let mut client = Client::new(config, Arc::new(transport.clone()));

    client.connect().await.unwrap();
    // Load succeeds as a no-op.
    client.load_sentry().await.unwrap();
    // Login is where the absence becomes an error.
    let result = client.login(&LoginOptions::new()).await;
    assert!(matches!(result, Err(KilnError::Validation(_))));
    assert!(transport.login_requests().is_empty());
}
