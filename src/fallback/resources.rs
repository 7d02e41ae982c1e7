//! Offline resource estimator.
//!
//! Per-acre planning constants for the supported crops. Pure arithmetic,
//! usable with no connectivity at all.

use serde::Serialize;

/// Per-acre constants for one crop.
struct CropRates {
  name: &'static str,
  /// kg of seed per acre
  seeds: f64,
  /// litres of water per acre per week
  water: f64,
  /// kg of fertilizer per acre
  fertilizer: f64,
  /// person-days per acre
  labor: f64,
  /// KES per acre
  cost: f64,
}

const RATES: &[CropRates] = &[
  CropRates {
    name: "maize",
    seeds: 20.0,
    water: 5000.0,
    fertilizer: 100.0,
    labor: 8.0,
    cost: 15000.0,
  },
  CropRates {
    name: "tomatoes",
    seeds: 0.1,
    water: 7000.0,
    fertilizer: 150.0,
    labor: 12.0,
    cost: 25000.0,
  },
  CropRates {
    name: "beans",
    seeds: 30.0,
    water: 4000.0,
    fertilizer: 50.0,
    labor: 6.0,
    cost: 8000.0,
  },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceEstimate {
  pub seeds_kg: f64,
  pub water_litres: f64,
  pub fertilizer_kg: f64,
  /// Rounded up: half a worker-day still costs a day.
  pub labor_days: f64,
  pub cost_kes: f64,
}

/// One line of a [`ResourceEstimate`], or the whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
  Seeds,
  Water,
  Fertilizer,
  Labor,
  Cost,
  All,
}

impl std::str::FromStr for ResourceKind {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "seeds" => Ok(Self::Seeds),
      "water" => Ok(Self::Water),
      "fertilizer" => Ok(Self::Fertilizer),
      "labor" => Ok(Self::Labor),
      "cost" => Ok(Self::Cost),
      "all" => Ok(Self::All),
      other => Err(format!("unknown resource type: {}", other)),
    }
  }
}

impl ResourceEstimate {
  /// Narrow the estimate to one resource, or keep the whole plan.
  pub fn select(&self, kind: ResourceKind) -> serde_json::Value {
    use serde_json::json;

    match kind {
      ResourceKind::Seeds => json!({"seeds_kg": self.seeds_kg}),
      ResourceKind::Water => json!({"water_litres": self.water_litres}),
      ResourceKind::Fertilizer => json!({"fertilizer_kg": self.fertilizer_kg}),
      ResourceKind::Labor => json!({"labor_days": self.labor_days}),
      ResourceKind::Cost => json!({"cost_kes": self.cost_kes}),
      ResourceKind::All => json!({
        "seeds_kg": self.seeds_kg,
        "water_litres": self.water_litres,
        "fertilizer_kg": self.fertilizer_kg,
        "labor_days": self.labor_days,
        "cost_kes": self.cost_kes,
      }),
    }
  }
}

/// Estimate resources for a plot. Unknown crops use the maize rates, the
/// most common case in the pilot regions.
pub fn estimate(crop: &str, acres: f64) -> ResourceEstimate {
  let key = crop.trim().to_lowercase();
  let rates = RATES
    .iter()
    .find(|r| r.name == key)
    .unwrap_or(&RATES[0]);

  ResourceEstimate {
    seeds_kg: acres * rates.seeds,
    water_litres: acres * rates.water,
    fertilizer_kg: acres * rates.fertilizer,
    labor_days: (acres * rates.labor).ceil(),
    cost_kes: acres * rates.cost,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_maize_per_acre_rates() {
    let e = estimate("Maize", 2.0);
    assert_eq!(e.seeds_kg, 40.0);
    assert_eq!(e.water_litres, 10000.0);
    assert_eq!(e.fertilizer_kg, 200.0);
    assert_eq!(e.labor_days, 16.0);
    assert_eq!(e.cost_kes, 30000.0);
  }

  #[test]
  fn test_labor_rounds_up() {
    let e = estimate("beans", 0.25);
    // 0.25 * 6 = 1.5 person-days, billed as 2
    assert_eq!(e.labor_days, 2.0);
  }

  #[test]
  fn test_unknown_crop_uses_maize_rates() {
    assert_eq!(estimate("cassava", 1.0), estimate("maize", 1.0));
  }

  #[test]
  fn test_select_narrows_to_a_single_resource() {
    let e = estimate("tomatoes", 2.0);

    assert_eq!(
      e.select(ResourceKind::Water),
      serde_json::json!({"water_litres": 14000.0})
    );

    let all = e.select(ResourceKind::All);
    assert_eq!(all["fertilizer_kg"], 300.0);
    assert_eq!(all["cost_kes"], 50000.0);
  }

  #[test]
  fn test_resource_kind_parses_case_insensitively() {
    assert_eq!("Water".parse::<ResourceKind>().unwrap(), ResourceKind::Water);
    assert_eq!("all".parse::<ResourceKind>().unwrap(), ResourceKind::All);
    assert!("fuel".parse::<ResourceKind>().is_err());
  }
}
