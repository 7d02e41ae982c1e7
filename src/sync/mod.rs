//! Sync coordinator: drains the mutation queue against the live network.
//!
//! Strictly in id order, one entry fully resolved before the next is
//! attempted; a chat message must never reach the server before the
//! session it references. A transport failure stops the cycle; the same
//! head entry is retried after an exponential backoff. Entries that keep
//! failing are flagged for manual review, never silently dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::connectivity::Connectivity;
use crate::error::Result;
use crate::net::RemoteApi;
use crate::queue::MutationQueue;

/// Retry tuning, from [`crate::config::SyncConfig`].
#[derive(Debug, Clone)]
pub struct SyncTuning {
  pub backoff_seed: Duration,
  pub backoff_cap: Duration,
  pub max_attempts: u32,
}

impl Default for SyncTuning {
  fn default() -> Self {
    Self {
      backoff_seed: Duration::from_millis(500),
      backoff_cap: Duration::from_secs(300),
      max_attempts: 8,
    }
  }
}

/// What a drain cycle accomplished.
#[derive(Debug, Default)]
pub struct DrainReport {
  pub succeeded: Vec<i64>,
  pub failed: Vec<i64>,
}

/// Replays queued mutations. `idle -> draining -> idle`; a second drain
/// request while one is running is a no-op.
pub struct SyncCoordinator {
  api: Arc<dyn RemoteApi>,
  queue: Arc<MutationQueue>,
  connectivity: Arc<Connectivity>,
  tuning: SyncTuning,
  draining: AtomicBool,
}

impl SyncCoordinator {
  pub fn new(
    api: Arc<dyn RemoteApi>,
    queue: Arc<MutationQueue>,
    connectivity: Arc<Connectivity>,
    tuning: SyncTuning,
  ) -> Self {
    Self {
      api,
      queue,
      connectivity,
      tuning,
      draining: AtomicBool::new(false),
    }
  }

  /// Drain the queue in ascending id order until it is empty, the
  /// network drops, or the head entry needs manual attention.
  pub async fn drain(&self) -> Result<DrainReport> {
    let mut report = DrainReport::default();

    if self.draining.swap(true, Ordering::AcqRel) {
      debug!("drain already in progress");
      return Ok(report);
    }

    let result = self.drain_inner(&mut report).await;
    self.draining.store(false, Ordering::Release);
    result.map(|()| report)
  }

  async fn drain_inner(&self, report: &mut DrainReport) -> Result<()> {
    loop {
      // A connectivity-lost event cancels the cycle between entries;
      // whatever attempt already completed has been applied.
      if !self.connectivity.is_online() {
        debug!("drain interrupted: offline");
        break;
      }

      let Some(entry) = self.queue.peek_oldest()? else {
        break;
      };

      if entry.needs_attention {
        // Ordering is global, so a flagged head blocks everything
        // behind it until the user discards it or resets its attempts.
        debug!("head entry {} awaits manual resolution", entry.id);
        report.failed.push(entry.id);
        break;
      }

      match self
        .api
        .request(
          &entry.method,
          &entry.endpoint,
          Some(&entry.payload),
          Some(&entry.idempotency_token),
        )
        .await
      {
        Ok(response) if response.is_success() => {
          self.connectivity.mark_online();
          self.queue.remove(entry.id)?;
          info!("synced mutation {} ({} {})", entry.id, entry.method, entry.endpoint);
          report.succeeded.push(entry.id);
        }
        Ok(response) => {
          // The server saw this mutation and rejected it; replaying it
          // would repeat a known-bad operation.
          self.connectivity.mark_online();
          warn!(
            "server rejected queued mutation {} with status {}",
            entry.id, response.status
          );
          self.queue.remove(entry.id)?;
          report.failed.push(entry.id);
        }
        Err(e) if e.is_transport() => {
          // Ambiguous: the server may or may not have applied it. The
          // entry stays; the idempotency token makes the retry safe.
          self.connectivity.mark_offline();
          let attempts = self.queue.mark_attempt(entry.id, &e.to_string())?;
          if attempts >= self.tuning.max_attempts {
            warn!(
              "mutation {} failed {} times, flagging for review",
              entry.id, attempts
            );
            self.queue.flag_attention(entry.id)?;
            report.failed.push(entry.id);
          }
          break;
        }
        Err(e) => return Err(e),
      }
    }

    Ok(())
  }

  /// Backoff before retrying a head entry that has failed `attempts`
  /// times: seed doubled per attempt, capped.
  pub fn backoff_delay(&self, attempts: u32) -> Duration {
    self
      .tuning
      .backoff_seed
      .saturating_mul(2u32.saturating_pow(attempts.min(32)))
      .min(self.tuning.backoff_cap)
  }
}
