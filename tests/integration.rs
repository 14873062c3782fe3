//! Integration tests for the authenticated request pipeline using wiremock.
//!
//! These cover the single-flight refresh behavior end to end: concurrent
//! 401s, refresh failure cleanup, token persistence, and session expiry
//! signalling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pharmamonitor_client::{
    Error, KeyValueStore, MemoryStore, PharmaClient, Result, SessionExpiryHandler,
};

/// Expiry handler that records whether it was invoked.
#[derive(Default)]
struct ExpiryFlag(AtomicBool);

impl SessionExpiryHandler for ExpiryFlag {
    fn on_session_expired(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ExpiryFlag {
    fn fired(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Create a client against the mock server with a pre-seeded token pair.
async fn seeded_client(
    mock_uri: &str,
    access: &str,
    refresh: &str,
) -> (Arc<PharmaClient>, Arc<MemoryStore>, Arc<ExpiryFlag>) {
    let store = Arc::new(MemoryStore::new());
    store
        .set_many(&[("access_token", access), ("refresh_token", refresh)])
        .await
        .unwrap();

    let expiry = Arc::new(ExpiryFlag::default());

    let client = PharmaClient::builder()
        .base_url(mock_uri)
        .storage(Arc::clone(&store) as Arc<dyn KeyValueStore>)
        .expiry_handler(Arc::clone(&expiry) as Arc<dyn SessionExpiryHandler>)
        .build()
        .unwrap();

    (Arc::new(client), store, expiry)
}

fn refresh_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({ "access_token": access, "refresh_token": refresh })
}

// ============================================================================
// Expired access token renewed transparently
// ============================================================================

#[tokio::test]
async fn test_login_then_401_then_refresh_then_success() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "user": { "id": 7, "email": "qa@pharmamonitor.example" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The stale access token is rejected; the renewed one is accepted.
    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alertas": [] })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .and(header("authorization", "Bearer R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = PharmaClient::builder()
        .base_url(&server.uri())
        .storage(Arc::clone(&store) as Arc<dyn KeyValueStore>)
        .build()?;

    let login = client.login("qa@pharmamonitor.example", "secret").await?;
    assert_eq!(login.access_token.as_deref(), Some("A1"));
    assert!(store.get("user").await?.is_some());

    // The caller never observes the 401.
    let alerts = client.get("/alertas").await?;
    assert_eq!(alerts.status, 200);

    // The refresh replaced both tokens atomically.
    assert_eq!(store.get("access_token").await?.unwrap(), "A2");
    assert_eq!(store.get("refresh_token").await?.unwrap(), "R2");

    Ok(())
}

// ============================================================================
// A 401 on the replayed request is terminal, no second refresh
// ============================================================================

#[tokio::test]
async fn test_retried_401_is_not_refreshed_again() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    let error = client.get("/alertas").await.unwrap_err();
    assert!(matches!(error, Error::Api { status: 401, .. }));

    // expect(1) on /silent-renew verifies no second refresh was issued.
    server.verify().await;
}

// ============================================================================
// Refresh failure tears down the session
// ============================================================================

#[tokio::test]
async fn test_refresh_failure_clears_session_and_signals_expiry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    let error = client.get("/alertas").await.unwrap_err();
    // The original caller sees the original 401, not the refresh error.
    assert!(matches!(error, Error::Api { status: 401, .. }));

    assert!(store.get("access_token").await.unwrap().is_none());
    assert!(store.get("refresh_token").await.unwrap().is_none());
    assert!(expiry.fired());

    server.verify().await;
}

// ============================================================================
// Single-flight refresh under concurrency
// ============================================================================

#[tokio::test]
async fn test_five_parallel_401s_issue_exactly_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alertas": [] })))
        .mount(&server)
        .await;

    // The delay widens the window in which the other four 401s arrive, so
    // they all queue behind the one in-flight refresh.
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .and(header("authorization", "Bearer R1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body("A2", "R2"))
                .set_delay(Duration::from_millis(250)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move { client.get("/alertas").await }));
    }

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    server.verify().await;
}

// ============================================================================
// Queued requests rejected on refresh failure, gate cleared after
// ============================================================================

#[tokio::test]
async fn test_failed_refresh_rejects_queue_and_releases_gate() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alertas": [] })))
        .mount(&server)
        .await;

    // First refresh attempt fails; the one after the gate is released
    // succeeds. Mount order matters: the failing mock is consumed first.
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(
            ResponseTemplate::new(401).set_delay(Duration::from_millis(250)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get("/alertas").await }
    });
    let second = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get("/alertas").await }
    });

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    // One caller initiated the refresh and surfaces its original 401; the
    // queued caller surfaces the refresh error. Order is not deterministic.
    let errors = [first.unwrap_err(), second.unwrap_err()];
    assert!(errors
        .iter()
        .any(|e| matches!(e, Error::Api { status: 401, .. })));
    assert!(errors.iter().any(|e| matches!(e, Error::RefreshFailed(_))));

    assert!(store.get("access_token").await.unwrap().is_none());
    assert!(expiry.fired());

    // The gate was released: a fresh 401 cycle triggers a new refresh.
    store
        .set_many(&[("access_token", "A1"), ("refresh_token", "R1")])
        .await
        .unwrap();
    let recovered = client.get("/alertas").await.unwrap();
    assert_eq!(recovered.status, 200);

    server.verify().await;
}

// ============================================================================
// Refresh authenticates with the refresh token; new pair carried after
// ============================================================================

#[tokio::test]
async fn test_refresh_endpoint_authenticates_with_refresh_token() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/productos"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/productos"))
        .and(header("authorization", "Bearer A3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "productos": [] })))
        .expect(1)
        .mount(&server)
        .await;

    // The refresh call must carry the refresh token, not the access token.
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .and(header("authorization", "Bearer R2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A3", "R3")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, _expiry) = seeded_client(&server.uri(), "A2", "R2").await;

    let response = client.get("/productos").await?;
    assert_eq!(response.status, 200);

    assert_eq!(store.get("access_token").await?.unwrap(), "A3");
    assert_eq!(store.get("refresh_token").await?.unwrap(), "R3");

    server.verify().await;
    Ok(())
}

// ============================================================================
// Token capture on unrelated successful responses
// ============================================================================

#[tokio::test]
async fn test_tokens_piggybacked_on_success_are_persisted() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/perfil"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "perfil": { "nombre": "QA" },
            "access_token": "A2",
            "refresh_token": "R2",
        })))
        .mount(&server)
        .await;

    let (client, store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    client.get("/perfil").await?;

    assert_eq!(store.get("access_token").await?.unwrap(), "A2");
    assert_eq!(store.get("refresh_token").await?.unwrap(), "R2");

    Ok(())
}

#[tokio::test]
async fn test_partial_token_pair_is_ignored() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/perfil"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "perfil": { "nombre": "QA" },
            "access_token": "A2",
        })))
        .mount(&server)
        .await;

    let (client, store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    client.get("/perfil").await?;

    // Without a complete pair the stored credentials stay untouched.
    assert_eq!(store.get("access_token").await?.unwrap(), "A1");
    assert_eq!(store.get("refresh_token").await?.unwrap(), "R1");

    Ok(())
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_local_session_even_when_server_fails() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (client, store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;
    store.set("user", "{\"id\":7}").await?;

    client.logout().await?;

    assert!(store.get("access_token").await?.is_none());
    assert!(store.get("refresh_token").await?.is_none());
    assert!(store.get("user").await?.is_none());

    Ok(())
}

// ============================================================================
// Non-auth errors pass through untouched
// ============================================================================

#[tokio::test]
async fn test_non_401_errors_propagate_unchanged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A2", "R2")))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store, expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    let error = client.get("/alertas").await.unwrap_err();
    assert!(matches!(error, Error::Api { status: 503, .. }));
    assert!(!expiry.fired());

    server.verify().await;
}

// ============================================================================
// A cancelled caller leaves the refresh to settle on its own task
// ============================================================================

#[tokio::test]
async fn test_cancelled_caller_does_not_wedge_the_refresh_gate() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alertas"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alertas": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body("A2", "R2"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, _expiry) = seeded_client(&server.uri(), "A1", "R1").await;

    // The caller gives up while its refresh is still in flight; dropping the
    // future must not leave the gate locked.
    let cancelled =
        tokio::time::timeout(Duration::from_millis(100), client.get("/alertas")).await;
    assert!(cancelled.is_err());

    // The detached refresh settles on its own and persists the new pair.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(store.get("access_token").await.unwrap().unwrap(), "A2");

    // A later request rides the renewed session instead of queuing forever
    // behind a refresh that never settles.
    let response = tokio::time::timeout(Duration::from_secs(2), client.get("/alertas"))
        .await
        .expect("request hung behind an unsettled refresh")
        .unwrap();
    assert_eq!(response.status, 200);

    server.verify().await;
}

// ============================================================================
// Storage faults
// ============================================================================

/// Store whose reads or writes can be made to fail, delegating to a
/// [`MemoryStore`] otherwise.
struct FaultStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn disk_fault() -> Error {
        Error::storage_io("session.json", "input/output error")
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FaultStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::disk_fault());
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::disk_fault());
        }
        self.inner.set(key, value).await
    }

    async fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::disk_fault());
        }
        self.inner.set_many(pairs).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.inner.remove_many(keys).await
    }

    fn name(&self) -> &str {
        "fault"
    }
}

#[tokio::test]
async fn test_storage_read_failure_surfaces_from_the_pipeline() {
    let server = MockServer::start().await;

    let store = Arc::new(FaultStore::new());
    let client = PharmaClient::builder()
        .base_url(&server.uri())
        .storage(Arc::clone(&store) as Arc<dyn KeyValueStore>)
        .build()
        .unwrap();

    store.set_fail_reads(true);

    // The token read happens before anything goes on the wire, and its
    // failure is the call's error.
    let error = client.get("/alertas").await.unwrap_err();
    assert!(matches!(error, Error::StorageIo { .. }));
}

#[tokio::test]
async fn test_storage_write_failure_during_refresh_tears_down_the_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alertas"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/silent-renew"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(FaultStore::new());
    store
        .set_many(&[("access_token", "A1"), ("refresh_token", "R1")])
        .await
        .unwrap();
    let expiry = Arc::new(ExpiryFlag::default());

    let client = PharmaClient::builder()
        .base_url(&server.uri())
        .storage(Arc::clone(&store) as Arc<dyn KeyValueStore>)
        .expiry_handler(Arc::clone(&expiry) as Arc<dyn SessionExpiryHandler>)
        .build()
        .unwrap();

    store.set_fail_writes(true);

    // The refresh endpoint answered with a fresh pair, but persisting it
    // failed, which counts as a refresh failure: the initiator surfaces its
    // original 401 and the session is torn down.
    let error = client.get("/alertas").await.unwrap_err();
    assert!(matches!(error, Error::Api { status: 401, .. }));
    assert!(expiry.fired());
    assert!(store.get("access_token").await.unwrap().is_none());
    assert!(store.get("refresh_token").await.unwrap().is_none());

    server.verify().await;
}
