// ============================================
// forecast.rs - 30-day disease risk forecast request
// ============================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LeafError, LeafResult};

/// Crops offered for forecasting, grouped by category.
pub const CROP_CATALOG: &[(&str, &[&str])] = &[
    (
        "Vegetables",
        &["Tomato", "Potato", "Pepper", "Cucumber", "Squash", "Corn (Maize)", "Soybean", "Bell Pepper"],
    ),
    (
        "Fruits",
        &["Apple", "Grape", "Strawberry", "Peach", "Cherry", "Citrus (Orange, Lemon)", "Blueberry"],
    ),
    ("Grains", &["Wheat", "Rice", "Barley"]),
    ("Ornamental Plants", &["Rose", "Lilac"]),
];

/// Case-insensitive catalogue lookup returning the canonical spelling.
pub fn find_crop(name: &str) -> Option<&'static str> {
    let name = name.trim();
    CROP_CATALOG
        .iter()
        .flat_map(|(_, crops)| crops.iter())
        .find(|crop| crop.eq_ignore_ascii_case(name))
        .copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropStage {
    Seedling,
    #[default]
    Vegetative,
    Flowering,
    Fruiting,
    Harvest,
}

impl CropStage {
    pub const ALL: [CropStage; 5] = [
        CropStage::Seedling,
        CropStage::Vegetative,
        CropStage::Flowering,
        CropStage::Fruiting,
        CropStage::Harvest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropStage::Seedling => "Seedling",
            CropStage::Vegetative => "Vegetative",
            CropStage::Flowering => "Flowering",
            CropStage::Fruiting => "Fruiting",
            CropStage::Harvest => "Harvest",
        }
    }
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CropStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown crop stage: {}", s))
    }
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl FromStr for Coordinates {
    type Err = String;

    /// Parses `"lat,lon"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON, got {:?}", s))?;
        let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude: {}", lat))?;
        let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude: {}", lon))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("coordinates out of range: {},{}", lat, lon));
        }
        Ok(Self { lat, lon })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub location: String,
    pub stage: CropStage,
    pub crops: Vec<String>,
}

impl ForecastRequest {
    pub fn new(location: impl Into<String>, stage: CropStage, crops: Vec<String>) -> LeafResult<Self> {
        let location = location.into();
        if location.trim().is_empty() {
            return Err(LeafError::MissingInput("Location"));
        }
        let crops: Vec<String> = crops
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if crops.is_empty() {
            return Err(LeafError::MissingInput("At least one crop"));
        }
        Ok(Self {
            location,
            stage,
            crops,
        })
    }
}
