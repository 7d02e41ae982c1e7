//! Durable cache of prior successful responses.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::fingerprint::RequestFingerprint;
use crate::error::{EngineError, Result};
use crate::store::Database;

const META_GENERATION: &str = "cache_generation";

/// Logical class of a cached response. Each class has its own routing
/// policy in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
  /// Bundled assets and rarely-changing documents: cache-first.
  Static,
  /// Dynamic API reads: network-first.
  ApiRead,
}

impl ResourceClass {
  fn as_str(&self) -> &'static str {
    match self {
      Self::Static => "static",
      Self::ApiRead => "api-read",
    }
  }

  fn parse(s: &str) -> Result<Self> {
    match s {
      "static" => Ok(Self::Static),
      "api-read" => Ok(Self::ApiRead),
      other => Err(EngineError::Storage(format!(
        "unknown cache class in store: {}",
        other
      ))),
    }
  }
}

/// A cached response, with enough metadata for the caller to judge
/// freshness.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub payload: serde_json::Value,
  pub class: ResourceClass,
  pub stored_at: DateTime<Utc>,
  /// False once the entry is older than the configured stale-after window.
  pub fresh: bool,
}

/// Key-addressed store of prior successful responses, partitioned by
/// class and tagged with the active build generation.
///
/// Replacement is last-write-wins per fingerprint. There is no
/// capacity-based eviction: the slot count is bounded by the number of
/// distinct endpoints and assets, not by request volume. A deployment
/// targeting very constrained storage can layer a per-class LRU cap on
/// top of `put`; that is an extension point, not a default.
pub struct DurableCache {
  db: Arc<Database>,
  generation: String,
  stale_after: Duration,
}

impl DurableCache {
  /// Open the cache under the given build generation.
  ///
  /// Activating a generation different from the stored one purges every
  /// entry tagged with another generation before any new entry is
  /// admitted, so assets cached by an old build are never served under a
  /// new one.
  pub fn open(db: Arc<Database>, generation: &str, stale_after: Duration) -> Result<Self> {
    let stored = db.meta_get(META_GENERATION)?;
    if stored.as_deref() != Some(generation) {
      let purged = db.with_conn(|conn| {
        conn
          .execute(
            "DELETE FROM cache_entries WHERE generation != ?",
            params![generation],
          )
          .map_err(EngineError::from)
      })?;
      if let Some(old) = stored {
        info!(
          "activated cache generation {} (was {}), purged {} entries",
          generation, old, purged
        );
      }
      db.meta_set(META_GENERATION, generation)?;
    }

    Ok(Self {
      db,
      generation: generation.to_string(),
      stale_after,
    })
  }

  /// Look up the cached response for a fingerprint.
  pub fn get(&self, fingerprint: &RequestFingerprint) -> Result<Option<CacheEntry>> {
    let row: Option<(Vec<u8>, String, String)> = self.db.with_conn(|conn| {
      conn
        .query_row(
          "SELECT payload, class, stored_at FROM cache_entries
           WHERE fingerprint = ? AND generation = ?",
          params![fingerprint.as_str(), self.generation],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(EngineError::from)
    })?;

    let Some((payload, class, stored_at)) = row else {
      return Ok(None);
    };

    let stored_at = DateTime::parse_from_rfc3339(&stored_at)
      .map_err(|e| EngineError::Storage(format!("bad stored_at timestamp: {}", e)))?
      .with_timezone(&Utc);

    Ok(Some(CacheEntry {
      payload: serde_json::from_slice(&payload)?,
      class: ResourceClass::parse(&class)?,
      fresh: Utc::now() - stored_at <= self.stale_after,
      stored_at,
    }))
  }

  /// Store a response, overwriting any previous entry for the same
  /// fingerprint.
  pub fn put(
    &self,
    fingerprint: &RequestFingerprint,
    payload: &serde_json::Value,
    class: ResourceClass,
  ) -> Result<()> {
    self.put_at(fingerprint, payload, class, Utc::now())
  }

  pub(crate) fn put_at(
    &self,
    fingerprint: &RequestFingerprint,
    payload: &serde_json::Value,
    class: ResourceClass,
    stored_at: DateTime<Utc>,
  ) -> Result<()> {
    let bytes = serde_json::to_vec(payload)?;

    self.db.with_conn(|conn| {
      conn.execute(
        "INSERT OR REPLACE INTO cache_entries (fingerprint, class, payload, generation, stored_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          fingerprint.as_str(),
          class.as_str(),
          bytes,
          self.generation,
          stored_at.to_rfc3339(),
        ],
      )?;
      Ok(())
    })
  }

  /// Purge every entry tagged with an old generation. Returns the number
  /// of entries removed.
  pub fn purge_generation(&self, old_generation: &str) -> Result<usize> {
    self.db.with_conn(|conn| {
      conn
        .execute(
          "DELETE FROM cache_entries WHERE generation = ?",
          params![old_generation],
        )
        .map_err(EngineError::from)
    })
  }
}
