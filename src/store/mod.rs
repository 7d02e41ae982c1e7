//! SQLite persistence shared by the durable cache and the mutation queue.
//!
//! One database file per installation. Both owners go through the same
//! connection, so single-key puts and deletes are atomic and serialized.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

/// Meta key set when a storage failure left the cache or queue in a
/// possibly inconsistent state; checked on the next open.
const META_STORAGE_SUSPECT: &str = "storage_suspect";

/// Schema for the offline engine tables.
const SCHEMA: &str = r#"
-- Durable cache: one row per request fingerprint, last write wins
CREATE TABLE IF NOT EXISTS cache_entries (
    fingerprint TEXT PRIMARY KEY,
    class TEXT NOT NULL,
    payload BLOB NOT NULL,
    generation TEXT NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_generation
    ON cache_entries(generation);

-- Mutation queue: ordered durable log of pending writes
CREATE TABLE IF NOT EXISTS mutation_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endpoint TEXT NOT NULL,
    method TEXT NOT NULL,
    payload BLOB NOT NULL,
    idempotency_token TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    needs_attention INTEGER NOT NULL DEFAULT 0
);

-- Engine metadata (active cache generation, integrity flags)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Database connection wrapper shared by the cache and the queue.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the database at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| EngineError::Storage(format!("failed to create data directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      EngineError::Storage(format!("failed to open database at {}: {}", path.display(), e))
    })?;

    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;
    db.check_integrity_if_suspect()?;

    Ok(db)
  }

  /// In-memory database for tests.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| EngineError::Storage(format!("failed to open in-memory database: {}", e)))?;

    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;

    Ok(db)
  }

  /// Default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| EngineError::Storage("could not determine data directory".into()))?;

    Ok(data_dir.join("vuno").join("offline.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    self.with_conn(|conn| {
      conn
        .execute_batch(SCHEMA)
        .map_err(|e| EngineError::Storage(format!("failed to run migrations: {}", e)))
    })
  }

  /// Run an operation with the shared connection.
  pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| EngineError::Storage(format!("lock poisoned: {}", e)))?;
    f(&conn)
  }

  /// Read a metadata value.
  pub(crate) fn meta_get(&self, key: &str) -> Result<Option<String>> {
    self.with_conn(|conn| {
      conn
        .query_row("SELECT value FROM meta WHERE key = ?", params![key], |row| {
          row.get(0)
        })
        .optional()
        .map_err(EngineError::from)
    })
  }

  /// Write a metadata value.
  pub(crate) fn meta_set(&self, key: &str, value: &str) -> Result<()> {
    self.with_conn(|conn| {
      conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        params![key, value],
      )?;
      Ok(())
    })
  }

  /// Flag the database for an integrity check on the next open.
  pub fn mark_suspect(&self) {
    if let Err(e) = self.meta_set(META_STORAGE_SUSPECT, "1") {
      warn!("failed to record storage-suspect flag: {}", e);
    }
  }

  /// If a previous session flagged a storage failure, verify the file and
  /// clear the flag.
  fn check_integrity_if_suspect(&self) -> Result<()> {
    if self.meta_get(META_STORAGE_SUSPECT)?.as_deref() != Some("1") {
      return Ok(());
    }

    let verdict: String = self.with_conn(|conn| {
      conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(EngineError::from)
    })?;

    if verdict == "ok" {
      info!("integrity check passed after suspect shutdown");
    } else {
      warn!("integrity check reported: {}", verdict);
    }

    self.with_conn(|conn| {
      conn.execute("DELETE FROM meta WHERE key = ?", params![META_STORAGE_SUSPECT])?;
      Ok(())
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_create_tables() {
    let db = Database::in_memory().unwrap();

    let count: i64 = db
      .with_conn(|conn| {
        conn
          .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('cache_entries', 'mutation_queue', 'meta')",
            [],
            |row| row.get(0),
          )
          .map_err(EngineError::from)
      })
      .unwrap();

    assert_eq!(count, 3);
  }

  #[test]
  fn test_meta_round_trip() {
    let db = Database::in_memory().unwrap();

    assert_eq!(db.meta_get("generation").unwrap(), None);
    db.meta_set("generation", "vuno-farming-v1").unwrap();
    assert_eq!(
      db.meta_get("generation").unwrap().as_deref(),
      Some("vuno-farming-v1")
    );

    // Overwrite
    db.meta_set("generation", "vuno-farming-v2").unwrap();
    assert_eq!(
      db.meta_get("generation").unwrap().as_deref(),
      Some("vuno-farming-v2")
    );
  }
}
