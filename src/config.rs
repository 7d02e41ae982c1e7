use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Override for the database location (defaults to the platform data
  /// directory).
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
    }
  }
}

/// Retry and timing knobs. These are tunable configuration, not a
/// contract; deployments on very poor networks raise the cap and the
/// attempt threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Bound on every network attempt, reads and writes alike.
  pub request_timeout_secs: u64,
  /// Periodic drain interval while online.
  pub interval_secs: u64,
  /// Seed for exponential backoff after a failed replay.
  pub backoff_seed_ms: u64,
  /// Ceiling on the backoff interval.
  pub backoff_cap_ms: u64,
  /// Transport failures tolerated before an entry is surfaced for
  /// manual review.
  pub max_attempts: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      request_timeout_secs: 10,
      interval_secs: 300,
      backoff_seed_ms: 500,
      backoff_cap_ms: 300_000,
      max_attempts: 8,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Build generation tag; changing it purges entries from older builds.
  pub version: String,
  /// Age after which a cached entry is reported stale.
  pub stale_after_minutes: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      version: "vuno-farming-v1".to_string(),
      stale_after_minutes: 60,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./vuno.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/vuno/config.yaml
  ///
  /// Built-in defaults apply when no file is found; the engine must
  /// come up even on a fresh install with nothing configured.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(EngineError::Storage(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        info!("no configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("vuno.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("vuno").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      EngineError::Storage(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    serde_yaml::from_str(&contents).map_err(|e| {
      EngineError::Storage(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.sync.request_timeout_secs)
  }

  pub fn sync_interval(&self) -> Duration {
    Duration::from_secs(self.sync.interval_secs)
  }

  pub fn backoff_seed(&self) -> Duration {
    Duration::from_millis(self.sync.backoff_seed_ms)
  }

  pub fn backoff_cap(&self) -> Duration {
    Duration::from_millis(self.sync.backoff_cap_ms)
  }

  pub fn stale_after(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.cache.stale_after_minutes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.cache.version, "vuno-farming-v1");
    assert_eq!(config.sync.max_attempts, 8);
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config: Config = serde_yaml::from_str(
      "api:\n  base_url: https://api.vuno.example\nsync:\n  max_attempts: 3\n",
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://api.vuno.example");
    assert_eq!(config.sync.max_attempts, 3);
    // Untouched sections fall back to defaults
    assert_eq!(config.sync.backoff_seed_ms, 500);
    assert_eq!(config.cache.stale_after_minutes, 60);
  }
}
