//! Seed facts bundled at build time.
//!
//! Read-only at runtime; these never participate in the mutation queue.
//! Values mirror the extension-service reference data for the pilot
//! regions.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CropProfile {
  pub name: &'static str,
  pub local_name: &'static str,
  pub kind: &'static str,
  pub planting_season: &'static str,
  pub spacing: &'static str,
  pub water_needs: &'static str,
  pub fertilizer: &'static str,
}

pub const CROPS: &[CropProfile] = &[
  CropProfile {
    name: "Maize",
    local_name: "Mahindi",
    kind: "cereal",
    planting_season: "Long rains (March-May)",
    spacing: "75cm rows, 30cm plants",
    water_needs: "5000L/acre/week",
    fertilizer: "100kg CAN, 50kg DAP per acre",
  },
  CropProfile {
    name: "Tomatoes",
    local_name: "Nyanya",
    kind: "vegetable",
    planting_season: "Year-round with irrigation",
    spacing: "60cm rows, 45cm plants",
    water_needs: "7000L/acre/week",
    fertilizer: "150kg NPK per acre",
  },
  CropProfile {
    name: "Beans",
    local_name: "Maharagwe",
    kind: "legume",
    planting_season: "Short rains (Oct-Dec)",
    spacing: "50cm rows, 10cm plants",
    water_needs: "4000L/acre/week",
    fertilizer: "50kg DAP per acre",
  },
];

#[derive(Debug, Clone, Serialize)]
pub struct DiseaseReference {
  pub name: &'static str,
  pub symptoms: &'static str,
  pub treatment: &'static str,
  pub organic: &'static str,
}

pub const DISEASES: &[DiseaseReference] = &[
  DiseaseReference {
    name: "Maize Lethal Necrosis",
    symptoms: "Yellow streaks on leaves, stunted growth",
    treatment: "Remove infected plants, use certified seeds",
    organic: "Crop rotation, resistant varieties",
  },
  DiseaseReference {
    name: "Tomato Early Blight",
    symptoms: "Brown spots with rings on lower leaves",
    treatment: "Copper-based fungicide",
    organic: "Baking soda spray, proper spacing",
  },
  DiseaseReference {
    name: "Bean Anthracnose",
    symptoms: "Dark lesions on pods and stems",
    treatment: "Fungicide spray",
    organic: "Neem oil, crop rotation",
  },
];

#[derive(Debug, Clone, Serialize)]
pub struct MarketPrice {
  pub crop: &'static str,
  pub market: &'static str,
  pub price: u32,
  pub unit: &'static str,
}

/// Default snapshot shown when no fresher market data was ever cached.
pub const MARKET_PRICES: &[MarketPrice] = &[
  MarketPrice {
    crop: "Tomatoes",
    market: "Nakuru",
    price: 180,
    unit: "kg",
  },
  MarketPrice {
    crop: "Maize",
    market: "Murang'a",
    price: 65,
    unit: "kg",
  },
  MarketPrice {
    crop: "Kale",
    market: "Nairobi",
    price: 40,
    unit: "bunch",
  },
  MarketPrice {
    crop: "Potatoes",
    market: "Eldoret",
    price: 120,
    unit: "kg",
  },
];

#[derive(Debug, Clone, Serialize)]
pub struct AdviceSheet {
  pub planting: &'static [&'static str],
  pub fertilizer: &'static [&'static str],
  pub pest_control: &'static [&'static str],
}

pub const GENERAL_ADVICE: AdviceSheet = AdviceSheet {
  planting: &[
    "Prepare land 1-2 weeks before planting",
    "Test soil pH (ideal 6.0-6.8)",
    "Apply well-rotted manure or compost",
    "Plant at onset of rains for rainfed crops",
    "Water early morning or late evening",
  ],
  fertilizer: &[
    "Maize: 50kg DAP at planting, 50kg CAN top-dress",
    "Tomatoes: 150kg NPK per acre",
    "Beans: 50kg DAP per acre",
    "Always follow soil test recommendations",
  ],
  pest_control: &[
    "Use neem oil spray for general pests",
    "Practice crop rotation",
    "Remove and burn infected plants",
    "Use physical barriers where possible",
  ],
};
