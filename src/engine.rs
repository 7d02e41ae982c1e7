//! Engine facade: the surface the rest of the application sees.
//!
//! Wires the dispatcher, cache, queue, and coordinator around one shared
//! database and connectivity flag, and owns the background task that
//! turns sync triggers (connectivity restored, periodic timer, explicit
//! request) into drain cycles.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::DurableCache;
use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::dispatch::{Dispatcher, ReadOutcome, ReadRequest, WriteOutcome, WriteRequest};
use crate::error::Result;
use crate::fallback::{self, Diagnosis, LocalFallbackStore, ResourceKind};
use crate::net::{HttpRemoteApi, RemoteApi};
use crate::queue::{MutationQueue, QueuedMutation};
use crate::store::Database;
use crate::sync::{DrainReport, SyncCoordinator, SyncTuning};

pub struct OfflineEngine {
  dispatcher: Arc<Dispatcher>,
  coordinator: Arc<SyncCoordinator>,
  queue: Arc<MutationQueue>,
  connectivity: Arc<Connectivity>,
  sync_interval: Duration,
  sync_trigger: Arc<Notify>,
}

impl OfflineEngine {
  /// Build an engine over an injected network and database.
  pub fn new(config: &Config, api: Arc<dyn RemoteApi>, db: Arc<Database>) -> Result<Self> {
    let connectivity = Arc::new(Connectivity::new(true));
    let cache = Arc::new(DurableCache::open(
      Arc::clone(&db),
      &config.cache.version,
      config.stale_after(),
    )?);
    let queue = Arc::new(MutationQueue::new(Arc::clone(&db)));
    let fallback = Arc::new(LocalFallbackStore::new());

    let dispatcher = Arc::new(Dispatcher::new(
      Arc::clone(&api),
      cache,
      Arc::clone(&queue),
      fallback,
      Arc::clone(&connectivity),
      Arc::clone(&db),
    ));

    let coordinator = Arc::new(SyncCoordinator::new(
      api,
      Arc::clone(&queue),
      Arc::clone(&connectivity),
      SyncTuning {
        backoff_seed: config.backoff_seed(),
        backoff_cap: config.backoff_cap(),
        max_attempts: config.sync.max_attempts,
      },
    ));

    Ok(Self {
      dispatcher,
      coordinator,
      queue,
      connectivity,
      sync_interval: config.sync_interval(),
      sync_trigger: Arc::new(Notify::new()),
    })
  }

  /// Build an engine with the real HTTP client and the default database
  /// location.
  pub fn with_http(config: &Config) -> Result<Self> {
    let api: Arc<dyn RemoteApi> = Arc::new(HttpRemoteApi::new(
      &config.api.base_url,
      config.request_timeout(),
    )?);
    let db = match &config.data_dir {
      Some(dir) => Arc::new(Database::open(&dir.join("offline.db"))?),
      None => Arc::new(Database::open_default()?),
    };
    Self::new(config, api, db)
  }

  pub async fn perform_read(&self, request: &ReadRequest) -> Result<ReadOutcome> {
    self.dispatcher.perform_read(request).await
  }

  pub async fn perform_write(&self, request: &WriteRequest) -> Result<WriteOutcome> {
    self.dispatcher.perform_write(request).await
  }

  /// Writes still waiting to sync.
  pub fn pending_count(&self) -> Result<usize> {
    self.queue.pending_count()
  }

  /// Entries that crossed the retry threshold and need a human decision.
  pub fn attention_entries(&self) -> Result<Vec<QueuedMutation>> {
    self.queue.attention_entries()
  }

  /// Give up on a flagged mutation for good.
  pub fn discard_mutation(&self, id: i64) -> Result<()> {
    self.queue.discard(id)
  }

  /// Retry a flagged mutation from scratch.
  pub fn retry_mutation(&self, id: i64) -> Result<()> {
    self.queue.reset_attempts(id)?;
    self.trigger_sync();
    Ok(())
  }

  pub fn connectivity_state(&self) -> ConnectivityState {
    self.connectivity.state()
  }

  /// Bridge for the platform connectivity signal. Optional: call
  /// outcomes keep the state accurate on their own.
  pub fn set_connectivity(&self, online: bool) {
    if online {
      self.connectivity.mark_online();
    } else {
      self.connectivity.mark_offline();
    }
  }

  /// Ask the background task for a drain. Fire and forget.
  pub fn trigger_sync(&self) {
    self.sync_trigger.notify_one();
  }

  /// Drain synchronously and report the outcome.
  pub async fn drain_now(&self) -> Result<DrainReport> {
    self.coordinator.drain().await
  }

  /// Offline diagnosis computator. Always flagged `local-fallback`.
  pub fn diagnose(&self, symptoms: &str) -> Diagnosis {
    fallback::diagnose(symptoms)
  }

  /// Offline resource estimator, narrowed to one resource or the whole
  /// plan.
  pub fn estimate_resources(&self, crop: &str, acres: f64, kind: ResourceKind) -> serde_json::Value {
    fallback::estimate(crop, acres).select(kind)
  }

  /// Queued writes for one endpoint, oldest first. A history view can
  /// append these to the cached answer so writes captured offline are
  /// visible before they sync.
  pub fn pending_for(&self, endpoint: &str) -> Result<Vec<QueuedMutation>> {
    self.queue.entries_for(endpoint)
  }

  /// Spawn the task that drains the queue on connectivity-restored
  /// events, explicit triggers, and a periodic timer, backing off while
  /// the head entry keeps failing.
  pub fn start_background_sync(&self) -> JoinHandle<()> {
    let coordinator = Arc::clone(&self.coordinator);
    let connectivity = Arc::clone(&self.connectivity);
    let queue = Arc::clone(&self.queue);
    let trigger = Arc::clone(&self.sync_trigger);
    let interval = self.sync_interval;

    tokio::spawn(async move {
      let mut delay = interval;
      loop {
        tokio::select! {
          _ = connectivity.wait_restored() => {}
          _ = trigger.notified() => {}
          _ = tokio::time::sleep(delay) => {}
        }

        if !connectivity.is_online() {
          delay = interval;
          continue;
        }

        match coordinator.drain().await {
          Ok(report) if !report.succeeded.is_empty() => {
            info!("background sync delivered {} mutations", report.succeeded.len());
          }
          Ok(_) => {}
          Err(e) => warn!("background sync failed: {}", e),
        }

        // Head still pending after failed attempts: wait out the backoff
        // instead of busy-looping on a dead endpoint.
        delay = match queue.peek_oldest() {
          Ok(Some(head)) if head.attempts > 0 && !head.needs_attention => {
            coordinator.backoff_delay(head.attempts)
          }
          _ => interval,
        };
      }
    })
  }
}
