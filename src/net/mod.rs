//! Remote API collaborator.
//!
//! The engine never talks to the network directly; everything goes
//! through [`RemoteApi`] so tests can script outcomes. Only transport
//! failures (no response at all) are errors here; any HTTP response,
//! success or rejection, comes back as an [`ApiResponse`] for the caller
//! to judge.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Header carrying the client-assigned idempotency token. The server
/// must treat repeated delivery of the same token as a no-op beyond the
/// first successful application.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// An HTTP response, however the server felt about the request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: u16,
  pub body: Value,
}

impl ApiResponse {
  /// The unambiguous-success contract: a 2xx status.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Injected network seam.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  async fn request(
    &self,
    method: &str,
    path: &str,
    payload: Option<&Value>,
    idempotency_token: Option<&str>,
  ) -> Result<ApiResponse>;
}

/// Production implementation backed by reqwest with a bounded
/// per-request timeout. Timeout expiry is a transport failure, never a
/// success.
pub struct HttpRemoteApi {
  client: reqwest::Client,
  base_url: String,
}

impl HttpRemoteApi {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| EngineError::Transport(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
  async fn request(
    &self,
    method: &str,
    path: &str,
    payload: Option<&Value>,
    idempotency_token: Option<&str>,
  ) -> Result<ApiResponse> {
    let method = reqwest::Method::from_bytes(method.as_bytes())
      .map_err(|_| EngineError::Transport(format!("invalid HTTP method: {}", method)))?;
    let url = format!("{}{}", self.base_url, path);

    let mut request = self.client.request(method, &url);
    if let Some(body) = payload {
      request = request.json(body);
    }
    if let Some(token) = idempotency_token {
      request = request.header(IDEMPOTENCY_HEADER, token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| EngineError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let text = response
      .text()
      .await
      .map_err(|e| EngineError::Transport(format!("failed to read response body: {}", e)))?;

    debug!("{} -> {}", url, status);

    // API responses are JSON; anything else is carried through as text
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    Ok(ApiResponse { status, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_success_is_2xx_only() {
    let ok = ApiResponse {
      status: 201,
      body: json!({"success": true}),
    };
    let rejected = ApiResponse {
      status: 422,
      body: json!({"success": false}),
    };
    let redirect = ApiResponse {
      status: 301,
      body: Value::Null,
    };

    assert!(ok.is_success());
    assert!(!rejected.is_success());
    assert!(!redirect.is_success());
  }
}
