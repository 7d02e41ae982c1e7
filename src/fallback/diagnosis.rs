//! Rule-based diagnosis fallback.
//!
//! An ordered table of keyword rules evaluated first-match-wins. This is
//! deliberately an inferior substitute for the server-side diagnosis and
//! every result says so via its `source` field, so the UI can tell the
//! farmer to re-check once online.

use serde::Serialize;

/// Confidence assigned to any keyword match. A blunt instrument, but a
/// known one.
const MATCH_CONFIDENCE: u8 = 60;

/// One diagnosis rule: if the symptom text contains the keyword, the
/// diagnosis applies.
struct DiagnosisRule {
  keyword: &'static str,
  diagnosis: &'static str,
}

/// Evaluated in order; earlier rules win.
const RULES: &[DiagnosisRule] = &[
  DiagnosisRule {
    keyword: "yellow",
    diagnosis: "Nutrient deficiency or viral infection",
  },
  DiagnosisRule {
    keyword: "spots",
    diagnosis: "Fungal or bacterial infection",
  },
  DiagnosisRule {
    keyword: "wilt",
    diagnosis: "Water stress or root disease",
  },
  DiagnosisRule {
    keyword: "holes",
    diagnosis: "Insect pest damage",
  },
  DiagnosisRule {
    keyword: "mold",
    diagnosis: "Fungal growth, improve ventilation",
  },
];

const RECOMMENDATIONS: &[&str] = &[
  "Remove severely affected parts",
  "Apply organic treatment (neem oil, baking soda)",
  "Improve growing conditions",
  "Consult expert when online for precise diagnosis",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
  Low,
  Medium,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
  pub disease_name: String,
  pub confidence: u8,
  pub urgency: Urgency,
  pub recommendations: Vec<String>,
  /// Always "local-fallback" here; the server diagnosis path reports its
  /// own provenance.
  pub source: &'static str,
}

/// Diagnose symptom text against the rule table.
pub fn diagnose(symptoms: &str) -> Diagnosis {
  let text = symptoms.to_lowercase();

  let (disease_name, confidence) = RULES
    .iter()
    .find(|rule| text.contains(rule.keyword))
    .map(|rule| (rule.diagnosis.to_string(), MATCH_CONFIDENCE))
    .unwrap_or_else(|| ("General plant health issue".to_string(), 0));

  Diagnosis {
    disease_name,
    urgency: if confidence > 50 {
      Urgency::Medium
    } else {
      Urgency::Low
    },
    confidence,
    recommendations: RECOMMENDATIONS.iter().map(|s| s.to_string()).collect(),
    source: "local-fallback",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keyword_match_sets_confidence_and_urgency() {
    let d = diagnose("Maize leaves turning yellow at the edges");
    assert_eq!(d.disease_name, "Nutrient deficiency or viral infection");
    assert_eq!(d.confidence, 60);
    assert_eq!(d.urgency, Urgency::Medium);
    assert_eq!(d.source, "local-fallback");
  }

  #[test]
  fn test_first_rule_wins() {
    // Both "yellow" and "spots" appear; the earlier rule applies.
    let d = diagnose("yellow spots on lower leaves");
    assert_eq!(d.disease_name, "Nutrient deficiency or viral infection");
  }

  #[test]
  fn test_no_match_gives_low_confidence_default() {
    let d = diagnose("plant looks unhappy");
    assert_eq!(d.disease_name, "General plant health issue");
    assert_eq!(d.confidence, 0);
    assert_eq!(d.urgency, Urgency::Low);
    assert!(!d.recommendations.is_empty());
  }
}
