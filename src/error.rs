//! Engine error taxonomy.
//!
//! Four kinds of failure, each with its own propagation policy:
//! transport errors are recovered locally (queue or retry), application
//! rejections surface immediately, storage failures degrade the engine to
//! network-only mode for the session, and `NoDataAvailable` is an explicit
//! "nothing anywhere" answer rather than fabricated data.

use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Maximum length of a response body kept in an error message.
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum EngineError {
  /// No response from the network at all (timeout, refused connection,
  /// DNS failure). Retryable.
  #[error("network unreachable: {0}")]
  Transport(String),

  /// The server responded with a rejection. Retrying would repeat a
  /// known-bad operation, so this is never queued.
  #[error("server rejected request (status {status}): {body}")]
  Application { status: u16, body: String },

  /// Local persistence failed. The cache and queue are considered
  /// possibly inconsistent until the next startup integrity check.
  #[error("local storage failure: {0}")]
  Storage(String),

  /// No cache entry, no network, no fallback mapping.
  #[error("no data available for this request while offline")]
  NoDataAvailable,
}

impl EngineError {
  pub fn application(status: u16, body: &str) -> Self {
    Self::Application {
      status,
      body: truncate_body(body),
    }
  }

  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport(_))
  }
}

impl From<rusqlite::Error> for EngineError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Storage(e.to_string())
  }
}

impl From<serde_json::Error> for EngineError {
  fn from(e: serde_json::Error) -> Self {
    Self::Storage(format!("payload serialization failed: {}", e))
  }
}

/// Truncate a response body so a huge error page never bloats logs.
fn truncate_body(body: &str) -> String {
  if body.len() <= MAX_ERROR_BODY_LENGTH {
    body.to_string()
  } else {
    let cut = body
      .char_indices()
      .take_while(|(i, _)| *i <= MAX_ERROR_BODY_LENGTH)
      .last()
      .map(|(i, _)| i)
      .unwrap_or(0);
    format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_application_error_truncates_body() {
    let long = "x".repeat(2000);
    let err = EngineError::application(500, &long);
    match err {
      EngineError::Application { status, body } => {
        assert_eq!(status, 500);
        assert!(body.len() < 600);
        assert!(body.contains("truncated"));
      }
      _ => panic!("wrong variant"),
    }
  }

  #[test]
  fn test_transport_is_transport() {
    assert!(EngineError::Transport("timeout".into()).is_transport());
    assert!(!EngineError::NoDataAvailable.is_transport());
  }
}
