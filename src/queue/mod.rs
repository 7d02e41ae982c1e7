//! Durable, ordered log of pending write operations.
//!
//! Writes captured while offline live here until the sync coordinator
//! gets an unambiguous server acknowledgment. Ids are assigned by the
//! database in strictly increasing enqueue order and the queue is always
//! drained in that order; nothing else ever removes an entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::store::Database;

/// A pending write operation.
#[derive(Debug, Clone)]
pub struct QueuedMutation {
  /// Monotonic sequence number; enqueue order is drain order.
  pub id: i64,
  pub endpoint: String,
  pub method: String,
  pub payload: serde_json::Value,
  /// Client-assigned token the server uses to collapse duplicate
  /// deliveries of the same mutation. Fixed at enqueue time.
  pub idempotency_token: String,
  pub enqueued_at: DateTime<Utc>,
  pub attempts: u32,
  pub last_error: Option<String>,
  /// Set once the retry threshold is crossed; the entry then waits for
  /// manual resolution instead of automatic retries.
  pub needs_attention: bool,
}

/// SQLite-backed mutation queue.
pub struct MutationQueue {
  db: Arc<Database>,
}

impl MutationQueue {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Append a write operation. Returns the assigned id.
  pub fn enqueue(&self, endpoint: &str, method: &str, payload: &serde_json::Value) -> Result<i64> {
    let bytes = serde_json::to_vec(payload)?;
    let enqueued_at = Utc::now().to_rfc3339();

    self.db.with_conn(|conn| {
      // Row and token commit together; no durable state ever carries an
      // empty token.
      let tx = conn.unchecked_transaction()?;
      tx.execute(
        "INSERT INTO mutation_queue (endpoint, method, payload, idempotency_token, enqueued_at)
         VALUES (?, ?, ?, '', ?)",
        params![endpoint, method, bytes, enqueued_at],
      )?;
      let id = tx.last_insert_rowid();

      // The token is derived from the id so every retry of this entry
      // carries the same one.
      tx.execute(
        "UPDATE mutation_queue SET idempotency_token = ? WHERE id = ?",
        params![idempotency_token(id, &enqueued_at), id],
      )?;
      tx.commit()?;

      Ok(id)
    })
  }

  /// The oldest pending entry, attention-flagged or not.
  pub fn peek_oldest(&self) -> Result<Option<QueuedMutation>> {
    self.db.with_conn(|conn| {
      conn
        .query_row(
          "SELECT id, endpoint, method, payload, idempotency_token, enqueued_at,
                  attempts, last_error, needs_attention
           FROM mutation_queue ORDER BY id ASC LIMIT 1",
          [],
          row_to_mutation,
        )
        .optional()
        .map_err(EngineError::from)
    })
  }

  /// Remove an entry after a confirmed server acknowledgment (or an
  /// application-level rejection that must not be retried).
  pub fn remove(&self, id: i64) -> Result<()> {
    self.db.with_conn(|conn| {
      conn.execute("DELETE FROM mutation_queue WHERE id = ?", params![id])?;
      Ok(())
    })
  }

  /// Record a failed replay attempt. Returns the new attempt count.
  pub fn mark_attempt(&self, id: i64, error: &str) -> Result<u32> {
    self.db.with_conn(|conn| {
      conn.execute(
        "UPDATE mutation_queue SET attempts = attempts + 1, last_error = ? WHERE id = ?",
        params![error, id],
      )?;
      conn
        .query_row(
          "SELECT attempts FROM mutation_queue WHERE id = ?",
          params![id],
          |row| row.get(0),
        )
        .map_err(EngineError::from)
    })
  }

  /// Flag an entry as needing manual resolution. It is never deleted
  /// automatically after this.
  pub fn flag_attention(&self, id: i64) -> Result<()> {
    self.db.with_conn(|conn| {
      conn.execute(
        "UPDATE mutation_queue SET needs_attention = 1 WHERE id = ?",
        params![id],
      )?;
      Ok(())
    })
  }

  /// Number of entries still waiting to sync.
  pub fn pending_count(&self) -> Result<usize> {
    self.db.with_conn(|conn| {
      let count: i64 = conn.query_row("SELECT COUNT(*) FROM mutation_queue", [], |row| row.get(0))?;
      Ok(count as usize)
    })
  }

  /// Entries that crossed the retry threshold and await manual review.
  pub fn attention_entries(&self) -> Result<Vec<QueuedMutation>> {
    self.db.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT id, endpoint, method, payload, idempotency_token, enqueued_at,
                attempts, last_error, needs_attention
         FROM mutation_queue WHERE needs_attention = 1 ORDER BY id ASC",
      )?;
      let rows = stmt
        .query_map([], row_to_mutation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
      Ok(rows)
    })
  }

  /// Pending entries for one endpoint, oldest first. Lets a history view
  /// include writes captured offline that have not synced yet.
  pub fn entries_for(&self, endpoint: &str) -> Result<Vec<QueuedMutation>> {
    self.db.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT id, endpoint, method, payload, idempotency_token, enqueued_at,
                attempts, last_error, needs_attention
         FROM mutation_queue WHERE endpoint = ? ORDER BY id ASC",
      )?;
      let rows = stmt
        .query_map(params![endpoint], row_to_mutation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
      Ok(rows)
    })
  }

  /// Manual resolution: drop a flagged entry for good.
  pub fn discard(&self, id: i64) -> Result<()> {
    self.remove(id)
  }

  /// Manual resolution: clear the attempt history so the entry is
  /// retried from scratch.
  pub fn reset_attempts(&self, id: i64) -> Result<()> {
    self.db.with_conn(|conn| {
      conn.execute(
        "UPDATE mutation_queue
         SET attempts = 0, last_error = NULL, needs_attention = 0
         WHERE id = ?",
        params![id],
      )?;
      Ok(())
    })
  }
}

fn row_to_mutation(row: &Row<'_>) -> rusqlite::Result<QueuedMutation> {
  let payload: Vec<u8> = row.get(3)?;
  let enqueued_at: String = row.get(5)?;

  Ok(QueuedMutation {
    id: row.get(0)?,
    endpoint: row.get(1)?,
    method: row.get(2)?,
    payload: serde_json::from_slice(&payload).unwrap_or(serde_json::Value::Null),
    idempotency_token: row.get(4)?,
    enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
      .map(|dt| dt.with_timezone(&Utc))
      .unwrap_or_else(|_| Utc::now()),
    attempts: row.get::<_, i64>(6)? as u32,
    last_error: row.get(7)?,
    needs_attention: row.get::<_, i64>(8)? != 0,
  })
}

fn idempotency_token(id: i64, enqueued_at: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(id.to_le_bytes());
  hasher.update(enqueued_at.as_bytes());
  hex::encode(hasher.finalize())[..32].to_string()
}
