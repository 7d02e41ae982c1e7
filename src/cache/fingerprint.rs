//! Stable fingerprints for logical read operations.
//!
//! Functionally identical reads must collide to one cache slot, so the
//! fingerprint is derived from the normalized operation (method, path,
//! sorted parameters) rather than from raw URL text.

use sha2::{Digest, Sha256};

/// Stable identifier for a logical read operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
  /// Fingerprint a read operation.
  ///
  /// Parameters are sorted by key so argument order never produces a
  /// distinct slot.
  pub fn for_read(method: &str, path: &str, params: &[(String, String)]) -> Self {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let query: Vec<String> = sorted
      .iter()
      .map(|(k, v)| format!("{}={}", k.trim().to_lowercase(), v.trim()))
      .collect();

    let input = format!(
      "{}:{}?{}",
      method.trim().to_uppercase(),
      normalize_path(path),
      query.join("&")
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    Self(hex::encode(hasher.finalize()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for RequestFingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Normalize a path for consistent hashing: trim, lowercase, drop a
/// trailing slash.
fn normalize_path(path: &str) -> String {
  let trimmed = path.trim().to_lowercase();
  if trimmed.len() > 1 && trimmed.ends_with('/') {
    trimmed[..trimmed.len() - 1].to_string()
  } else {
    trimmed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn p(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_equivalent_reads_collide() {
    let a = RequestFingerprint::for_read(
      "GET",
      "/api/market/prices",
      &p(&[("crop", "maize"), ("region", "nakuru")]),
    );
    let b = RequestFingerprint::for_read(
      "get",
      "/api/market/prices/",
      &p(&[("region", "nakuru"), ("crop", "maize")]),
    );

    assert_eq!(a, b);
  }

  #[test]
  fn test_distinct_operations_differ() {
    let prices = RequestFingerprint::for_read("GET", "/api/market/prices", &[]);
    let crops = RequestFingerprint::for_read("GET", "/api/farmer/crops-list", &[]);
    let other_params =
      RequestFingerprint::for_read("GET", "/api/market/prices", &p(&[("crop", "beans")]));

    assert_ne!(prices, crops);
    assert_ne!(prices, other_params);
  }

  #[test]
  fn test_fingerprint_is_fixed_length_hex() {
    let fp = RequestFingerprint::for_read("GET", "/index.html", &[]);
    assert_eq!(fp.as_str().len(), 64);
    assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
  }
}
