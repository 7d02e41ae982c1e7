//! Local fallback store: the answer of last resort.
//!
//! Static seed data plus rule-based computators, used only when neither
//! the cache nor the network has anything. Pure and synchronous: no
//! network, no persistence. Everything returned from here is flagged
//! `local-fallback` so the UI can show it for what it is.

mod data;
mod diagnosis;
mod resources;

pub use data::{AdviceSheet, CropProfile, DiseaseReference, MarketPrice};
pub use diagnosis::{diagnose, Diagnosis, Urgency};
pub use resources::{estimate, ResourceEstimate, ResourceKind};

use serde_json::{json, Value};

/// Domains the fallback store can answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKey {
  Crops,
  Diseases,
  MarketPrices,
  PlantingAdvice,
}

impl DomainKey {
  /// Map an API path to a fallback domain, if one covers it.
  pub fn for_path(path: &str) -> Option<Self> {
    let path = path.trim().trim_end_matches('/').to_lowercase();
    match path.as_str() {
      "/api/farmer/crops-list" => Some(Self::Crops),
      "/api/disease/common" => Some(Self::Diseases),
      "/api/market/prices" => Some(Self::MarketPrices),
      "/api/weather/planting-advice" => Some(Self::PlantingAdvice),
      _ => None,
    }
  }
}

/// Bundled seed facts, shaped like the API responses they stand in for.
#[derive(Debug, Default)]
pub struct LocalFallbackStore;

impl LocalFallbackStore {
  pub fn new() -> Self {
    Self
  }

  /// Fetch the fact for a domain key.
  pub fn lookup(&self, key: DomainKey) -> Value {
    let facts = match key {
      DomainKey::Crops => serde_json::to_value(data::CROPS),
      DomainKey::Diseases => serde_json::to_value(data::DISEASES),
      DomainKey::MarketPrices => serde_json::to_value(data::MARKET_PRICES),
      DomainKey::PlantingAdvice => serde_json::to_value(data::GENERAL_ADVICE),
    };

    json!({
      "success": true,
      "source": "local-fallback",
      "data": facts.unwrap_or(Value::Null),
    })
  }

  /// Fetch the fact mapped to an API path, if any.
  pub fn lookup_path(&self, path: &str) -> Option<Value> {
    DomainKey::for_path(path).map(|key| self.lookup(key))
  }
}
