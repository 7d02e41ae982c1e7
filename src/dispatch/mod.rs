//! Strategy dispatcher: every outbound operation enters here.
//!
//! Reads are classified static (cache-first) or API (network-first) and
//! resolve against the durable cache, the live network, or the local
//! fallback store. Writes go out immediately when the network is there
//! and land in the mutation queue when it is not. Network absence is
//! never raised to the caller; the worst a read can do is report that no
//! data exists anywhere.
//!
//! Call outcomes double as the connectivity signal: a successful network
//! call marks the state online, a transport-level failure marks it
//! offline. Application-level rejections prove the network works and do
//! not flip the state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, DurableCache, RequestFingerprint, ResourceClass};
use crate::connectivity::Connectivity;
use crate::error::{EngineError, Result};
use crate::fallback::LocalFallbackStore;
use crate::net::{ApiResponse, RemoteApi};
use crate::queue::MutationQueue;
use crate::store::Database;

/// Where a returned value came from, for the UI's freshness indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
  /// Fresh from the network just now.
  Live,
  /// From the cache, within the stale-after window.
  CachedFresh,
  /// From the cache, either aged out or served because the network
  /// failed.
  CachedStale,
  /// Computed or bundled locally; an inferior substitute.
  LocalFallback,
}

/// A read operation descriptor.
#[derive(Debug, Clone)]
pub struct ReadRequest {
  pub method: String,
  pub path: String,
  pub params: Vec<(String, String)>,
}

impl ReadRequest {
  pub fn get(path: &str) -> Self {
    Self {
      method: "GET".to_string(),
      path: path.to_string(),
      params: Vec::new(),
    }
  }

  pub fn with_param(mut self, key: &str, value: &str) -> Self {
    self.params.push((key.to_string(), value.to_string()));
    self
  }

  /// Static assets are cache-first; anything under /api/ is a dynamic
  /// read and goes network-first.
  pub fn class(&self) -> ResourceClass {
    if self.path.contains("/api/") {
      ResourceClass::ApiRead
    } else {
      ResourceClass::Static
    }
  }

  pub fn fingerprint(&self) -> RequestFingerprint {
    RequestFingerprint::for_read(&self.method, &self.path, &self.params)
  }

  /// The concrete path sent over the wire, query string included.
  fn request_path(&self) -> String {
    if self.params.is_empty() {
      return self.path.clone();
    }
    let query: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    format!("{}?{}", self.path, query.join("&"))
  }
}

/// A write operation descriptor.
#[derive(Debug, Clone)]
pub struct WriteRequest {
  pub method: String,
  pub endpoint: String,
  pub payload: Value,
}

impl WriteRequest {
  pub fn post(endpoint: &str, payload: Value) -> Self {
    Self {
      method: "POST".to_string(),
      endpoint: endpoint.to_string(),
      payload,
    }
  }

  pub fn put(endpoint: &str, payload: Value) -> Self {
    Self {
      method: "PUT".to_string(),
      endpoint: endpoint.to_string(),
      payload,
    }
  }
}

/// A resolved read, with provenance.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
  pub body: Value,
  pub provenance: Provenance,
  /// When the payload was cached, for cache-sourced answers.
  pub stored_at: Option<DateTime<Utc>>,
}

impl ReadOutcome {
  fn live(body: Value) -> Self {
    Self {
      body,
      provenance: Provenance::Live,
      stored_at: None,
    }
  }

  fn cached(entry: CacheEntry, forced_stale: bool) -> Self {
    Self {
      provenance: if entry.fresh && !forced_stale {
        Provenance::CachedFresh
      } else {
        Provenance::CachedStale
      },
      stored_at: Some(entry.stored_at),
      body: entry.payload,
    }
  }

  fn local_fallback(body: Value) -> Self {
    Self {
      body,
      provenance: Provenance::LocalFallback,
      stored_at: None,
    }
  }
}

/// A resolved write: either applied live or durably queued.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
  /// Delivered and acknowledged by the server.
  Applied { status: u16, body: Value },
  /// Saved locally, will sync. Carries no guessed server identifiers.
  Queued { id: i64 },
}

/// Routes every outbound operation per the per-class policy.
pub struct Dispatcher {
  api: Arc<dyn RemoteApi>,
  cache: Arc<DurableCache>,
  queue: Arc<MutationQueue>,
  fallback: Arc<LocalFallbackStore>,
  connectivity: Arc<Connectivity>,
  db: Arc<Database>,
  /// Set after a local storage failure; the dispatcher then runs
  /// network-only for the rest of the session.
  storage_degraded: AtomicBool,
}

impl Dispatcher {
  pub fn new(
    api: Arc<dyn RemoteApi>,
    cache: Arc<DurableCache>,
    queue: Arc<MutationQueue>,
    fallback: Arc<LocalFallbackStore>,
    connectivity: Arc<Connectivity>,
    db: Arc<Database>,
  ) -> Self {
    Self {
      api,
      cache,
      queue,
      fallback,
      connectivity,
      db,
      storage_degraded: AtomicBool::new(false),
    }
  }

  /// Resolve a read according to its class policy.
  pub async fn perform_read(&self, request: &ReadRequest) -> Result<ReadOutcome> {
    let fingerprint = request.fingerprint();
    match request.class() {
      ResourceClass::Static => self.read_cache_first(request, &fingerprint).await,
      ResourceClass::ApiRead => self.read_network_first(request, &fingerprint).await,
    }
  }

  /// Deliver a write immediately when online, queue it otherwise.
  pub async fn perform_write(&self, request: &WriteRequest) -> Result<WriteOutcome> {
    if self.connectivity.is_online() {
      match self
        .api
        .request(&request.method, &request.endpoint, Some(&request.payload), None)
        .await
      {
        Ok(response) if response.is_success() => {
          self.connectivity.mark_online();
          return Ok(WriteOutcome::Applied {
            status: response.status,
            body: response.body,
          });
        }
        Ok(response) => {
          // The server saw it and said no; retrying repeats a known-bad
          // operation, so this never touches the queue.
          self.connectivity.mark_online();
          return Err(EngineError::application(
            response.status,
            &response.body.to_string(),
          ));
        }
        Err(e) if e.is_transport() => {
          self.connectivity.mark_offline();
          debug!("write delivery failed, queueing: {}", e);
        }
        Err(e) => return Err(e),
      }
    }

    let id = match self
      .queue
      .enqueue(&request.endpoint, &request.method, &request.payload)
    {
      Ok(id) => id,
      Err(e) => {
        self.note_storage_failure(&e);
        return Err(e);
      }
    };

    Ok(WriteOutcome::Queued { id })
  }

  async fn read_cache_first(
    &self,
    request: &ReadRequest,
    fingerprint: &RequestFingerprint,
  ) -> Result<ReadOutcome> {
    if let Some(entry) = self.cache_get(fingerprint) {
      if self.connectivity.is_online() {
        self.spawn_refresh(request.clone(), fingerprint.clone());
      }
      return Ok(ReadOutcome::cached(entry, false));
    }

    match self.fetch(request).await {
      Ok(response) if response.is_success() => {
        self.cache_put(fingerprint, &response.body, ResourceClass::Static);
        Ok(ReadOutcome::live(response.body))
      }
      Ok(response) => {
        // No cache entry and the server said no; the miss path ends in
        // "no data anywhere", not a status code.
        debug!(
          "static fetch of {} rejected with status {}",
          request.path, response.status
        );
        self.fallback_or(request, EngineError::NoDataAvailable)
      }
      Err(e) if e.is_transport() => self.fallback_or(request, EngineError::NoDataAvailable),
      Err(e) => Err(e),
    }
  }

  async fn read_network_first(
    &self,
    request: &ReadRequest,
    fingerprint: &RequestFingerprint,
  ) -> Result<ReadOutcome> {
    match self.fetch(request).await {
      Ok(response) if response.is_success() => {
        self.cache_put(fingerprint, &response.body, ResourceClass::ApiRead);
        Ok(ReadOutcome::live(response.body))
      }
      Ok(response) => self.stale_cache_or_fallback(
        request,
        fingerprint,
        EngineError::application(response.status, &response.body.to_string()),
      ),
      Err(e) if e.is_transport() => {
        self.stale_cache_or_fallback(request, fingerprint, EngineError::NoDataAvailable)
      }
      Err(e) => Err(e),
    }
  }

  /// Network fetch with the connectivity side effect applied.
  async fn fetch(&self, request: &ReadRequest) -> Result<ApiResponse> {
    match self
      .api
      .request(&request.method, &request.request_path(), None, None)
      .await
    {
      Ok(response) => {
        self.connectivity.mark_online();
        Ok(response)
      }
      Err(e) => {
        if e.is_transport() {
          self.connectivity.mark_offline();
        }
        Err(e)
      }
    }
  }

  /// The network failed: last cached answer (reported stale), then the
  /// fallback store, then the given error.
  fn stale_cache_or_fallback(
    &self,
    request: &ReadRequest,
    fingerprint: &RequestFingerprint,
    otherwise: EngineError,
  ) -> Result<ReadOutcome> {
    if let Some(entry) = self.cache_get(fingerprint) {
      return Ok(ReadOutcome::cached(entry, true));
    }
    self.fallback_or(request, otherwise)
  }

  fn fallback_or(&self, request: &ReadRequest, otherwise: EngineError) -> Result<ReadOutcome> {
    match self.fallback.lookup_path(&request.path) {
      Some(body) => Ok(ReadOutcome::local_fallback(body)),
      None => Err(otherwise),
    }
  }

  /// Opportunistic refresh of a cache-first hit. Best effort only;
  /// failures are logged and the cached answer the caller already has
  /// stands.
  fn spawn_refresh(&self, request: ReadRequest, fingerprint: RequestFingerprint) {
    if self.storage_degraded.load(Ordering::Relaxed) {
      return;
    }

    let api = Arc::clone(&self.api);
    let cache = Arc::clone(&self.cache);
    let connectivity = Arc::clone(&self.connectivity);

    tokio::spawn(async move {
      match api
        .request(&request.method, &request.request_path(), None, None)
        .await
      {
        Ok(response) if response.is_success() => {
          connectivity.mark_online();
          if let Err(e) = cache.put(&fingerprint, &response.body, ResourceClass::Static) {
            warn!("background refresh could not store {}: {}", request.path, e);
          }
        }
        Ok(response) => {
          connectivity.mark_online();
          debug!(
            "background refresh of {} rejected with status {}",
            request.path, response.status
          );
        }
        Err(e) => {
          if e.is_transport() {
            connectivity.mark_offline();
          }
          debug!("background refresh of {} failed: {}", request.path, e);
        }
      }
    });
  }

  fn cache_get(&self, fingerprint: &RequestFingerprint) -> Option<CacheEntry> {
    if self.storage_degraded.load(Ordering::Relaxed) {
      return None;
    }
    match self.cache.get(fingerprint) {
      Ok(entry) => entry,
      Err(e) => {
        self.note_storage_failure(&e);
        None
      }
    }
  }

  fn cache_put(&self, fingerprint: &RequestFingerprint, body: &Value, class: ResourceClass) {
    if self.storage_degraded.load(Ordering::Relaxed) {
      return;
    }
    if let Err(e) = self.cache.put(fingerprint, body, class) {
      self.note_storage_failure(&e);
    }
  }

  /// Local persistence failed: log it, flag the file for an integrity
  /// check on next startup, and run network-only for this session.
  fn note_storage_failure(&self, error: &EngineError) {
    warn!("storage failure, degrading to network-only: {}", error);
    self.storage_degraded.store(true, Ordering::Relaxed);
    self.db.mark_suspect();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::ApiResponse;
  use async_trait::async_trait;
  use serde_json::json;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// Scripted network: pops one outcome per call, records every call.
  struct ScriptedApi {
    script: Mutex<VecDeque<Result<ApiResponse>>>,
    calls: Mutex<Vec<(String, String)>>,
  }

  impl ScriptedApi {
    fn new(script: Vec<Result<ApiResponse>>) -> Arc<Self> {
      Arc::new(Self {
        script: Mutex::new(script.into()),
        calls: Mutex::new(Vec::new()),
      })
    }

    fn calls(&self) -> Vec<(String, String)> {
      self.calls.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl RemoteApi for ScriptedApi {
    async fn request(
      &self,
      method: &str,
      path: &str,
      _payload: Option<&Value>,
      _idempotency_token: Option<&str>,
    ) -> Result<ApiResponse> {
      self
        .calls
        .lock()
        .unwrap()
        .push((method.to_string(), path.to_string()));
      self
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(EngineError::Transport("no route to host".into())))
    }
  }

  fn ok(body: Value) -> Result<ApiResponse> {
    Ok(ApiResponse { status: 200, body })
  }

  fn rejected(status: u16, body: Value) -> Result<ApiResponse> {
    Ok(ApiResponse { status, body })
  }

  fn transport_err() -> Result<ApiResponse> {
    Err(EngineError::Transport("connection timed out".into()))
  }

  fn dispatcher(api: Arc<ScriptedApi>, initially_online: bool) -> Dispatcher {
    let db = Arc::new(Database::in_memory().unwrap());
    let cache = Arc::new(
      DurableCache::open(Arc::clone(&db), "vuno-farming-v1", chrono::Duration::minutes(60))
        .unwrap(),
    );
    let queue = Arc::new(MutationQueue::new(Arc::clone(&db)));
    Dispatcher::new(
      api,
      cache,
      queue,
      Arc::new(LocalFallbackStore::new()),
      Arc::new(Connectivity::new(initially_online)),
      db,
    )
  }

  #[tokio::test]
  async fn test_network_first_success_caches_and_reports_live() {
    let api = ScriptedApi::new(vec![ok(json!({"prices": [1, 2]}))]);
    let d = dispatcher(Arc::clone(&api), true);

    let outcome = d
      .perform_read(&ReadRequest::get("/api/market/price-history"))
      .await
      .unwrap();

    assert_eq!(outcome.provenance, Provenance::Live);
    assert_eq!(outcome.body, json!({"prices": [1, 2]}));
  }

  #[tokio::test]
  async fn test_dynamic_read_serves_stale_cache_when_network_fails() {
    // First read online caches P1, second read hits a dead network.
    let api = ScriptedApi::new(vec![ok(json!({"price": 180})), transport_err()]);
    let d = dispatcher(Arc::clone(&api), true);
    let request = ReadRequest::get("/api/market/price-history").with_param("crop", "tomatoes");

    let first = d.perform_read(&request).await.unwrap();
    assert_eq!(first.provenance, Provenance::Live);

    let second = d.perform_read(&request).await.unwrap();
    assert_eq!(second.provenance, Provenance::CachedStale);
    assert_eq!(second.body, json!({"price": 180}));
    assert!(second.stored_at.is_some());
  }

  #[tokio::test]
  async fn test_read_with_no_cache_and_no_network_uses_fallback() {
    let api = ScriptedApi::new(vec![transport_err()]);
    let d = dispatcher(Arc::clone(&api), true);

    let outcome = d
      .perform_read(&ReadRequest::get("/api/market/prices"))
      .await
      .unwrap();

    assert_eq!(outcome.provenance, Provenance::LocalFallback);
    assert_eq!(outcome.body["source"], "local-fallback");
  }

  #[tokio::test]
  async fn test_total_miss_is_no_data_available() {
    let api = ScriptedApi::new(vec![transport_err()]);
    let d = dispatcher(Arc::clone(&api), true);

    // No fallback mapping exists for chat history
    let err = d
      .perform_read(&ReadRequest::get("/api/chat/history"))
      .await
      .unwrap_err();

    assert!(matches!(err, EngineError::NoDataAvailable));
  }

  #[tokio::test]
  async fn test_static_miss_with_rejected_fetch_is_no_data_available() {
    let api = ScriptedApi::new(vec![rejected(404, json!({"error": "not found"}))]);
    let d = dispatcher(Arc::clone(&api), true);

    let err = d
      .perform_read(&ReadRequest::get("/missing.html"))
      .await
      .unwrap_err();

    assert!(matches!(err, EngineError::NoDataAvailable));
  }

  #[tokio::test]
  async fn test_transport_failure_flips_connectivity_offline() {
    let api = ScriptedApi::new(vec![transport_err()]);
    let d = dispatcher(Arc::clone(&api), true);

    let _ = d.perform_read(&ReadRequest::get("/api/chat/history")).await;

    assert!(!d.connectivity.is_online());
  }

  #[tokio::test]
  async fn test_successful_read_flips_connectivity_online() {
    let api = ScriptedApi::new(vec![ok(json!({}))]);
    let d = dispatcher(Arc::clone(&api), false);
    // Offline engines still try dynamic reads; a success proves the
    // network is back.
    let _ = d.perform_read(&ReadRequest::get("/api/weather/current")).await;

    assert!(d.connectivity.is_online());
  }

  #[tokio::test]
  async fn test_write_online_applies_without_touching_queue() {
    let api = ScriptedApi::new(vec![ok(json!({"success": true, "id": 42}))]);
    let d = dispatcher(Arc::clone(&api), true);

    let outcome = d
      .perform_write(&WriteRequest::post("/api/chat/message", json!({"message": "hi"})))
      .await
      .unwrap();

    match outcome {
      WriteOutcome::Applied { status, body } => {
        assert_eq!(status, 200);
        assert_eq!(body["id"], 42);
      }
      WriteOutcome::Queued { .. } => panic!("should not queue while online"),
    }
    assert_eq!(d.queue.pending_count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_write_queues_on_transport_failure() {
    let api = ScriptedApi::new(vec![transport_err()]);
    let d = dispatcher(Arc::clone(&api), true);

    let outcome = d
      .perform_write(&WriteRequest::post(
        "/api/chat/message",
        json!({"message": "maize leaves turning yellow"}),
      ))
      .await
      .unwrap();

    assert!(matches!(outcome, WriteOutcome::Queued { id: 1 }));
    assert_eq!(d.queue.pending_count().unwrap(), 1);
    assert!(!d.connectivity.is_online());
  }

  #[tokio::test]
  async fn test_write_while_offline_queues_without_network_attempt() {
    let api = ScriptedApi::new(vec![]);
    let d = dispatcher(Arc::clone(&api), false);

    let outcome = d
      .perform_write(&WriteRequest::put("/api/farmer/profile", json!({"name": "Atieno"})))
      .await
      .unwrap();

    assert!(matches!(outcome, WriteOutcome::Queued { .. }));
    assert!(api.calls().is_empty());
  }

  #[tokio::test]
  async fn test_write_rejection_surfaces_and_is_not_queued() {
    let api = ScriptedApi::new(vec![rejected(422, json!({"error": "message too long"}))]);
    let d = dispatcher(Arc::clone(&api), true);

    let err = d
      .perform_write(&WriteRequest::post("/api/chat/message", json!({})))
      .await
      .unwrap_err();

    assert!(matches!(err, EngineError::Application { status: 422, .. }));
    assert_eq!(d.queue.pending_count().unwrap(), 0);
    // An application rejection still proves the network works
    assert!(d.connectivity.is_online());
  }

  #[tokio::test]
  async fn test_static_read_is_cache_first() {
    let api = ScriptedApi::new(vec![ok(json!("<html>"))]);
    let d = dispatcher(Arc::clone(&api), false);
    let request = ReadRequest::get("/index.html");

    // Miss: fetched from network and cached (connectivity flips online)
    let first = d.perform_read(&request).await.unwrap();
    assert_eq!(first.provenance, Provenance::Live);

    // Hit: served from cache; the only further traffic is the
    // opportunistic background refresh, not a blocking fetch.
    let second = d.perform_read(&request).await.unwrap();
    assert_eq!(second.provenance, Provenance::CachedFresh);
    assert_eq!(second.body, json!("<html>"));
  }
}
