//! Data models for the signal mapping pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::severity::SeverityTier;

// ---

/// Placeholder used when an optional input cell is empty.
pub const UNKNOWN: &str = "unknown";

/// Cellular generation reported by the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    // ---
    #[serde(rename = "5G")]
    FiveG,
    #[serde(rename = "4G")]
    FourG,
    #[serde(rename = "3G")]
    ThreeG,
}

impl NetworkType {
    pub fn label(self) -> &'static str {
        // ---
        match self {
            NetworkType::FiveG => "5G",
            NetworkType::FourG => "4G",
            NetworkType::ThreeG => "3G",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NetworkType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_uppercase().as_str() {
            "5G" => Ok(NetworkType::FiveG),
            "4G" => Ok(NetworkType::FourG),
            "3G" => Ok(NetworkType::ThreeG),
            _ => Err(()),
        }
    }
}

/// One crowd-reported weak signal row, as loaded from the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    // ---
    pub location: String,
    /// `None` when the cell was empty or a null sentinel.
    pub detailed_address: Option<String>,
    pub network_type: NetworkType,
    /// Nominally 1-10; out of range values are clamped by the classifier.
    pub signal_strength: i32,
    pub report_time: String,
    pub reporter: String,
    pub note: String,
}

impl Observation {
    /// Address text sent to the geocoder: the detailed address when present,
    /// otherwise the location label.
    pub fn lookup_address(&self) -> &str {
        // ---
        self.detailed_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(&self.location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// An observation that resolved to coordinates, with its severity attached.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPoint {
    // ---
    observation: Observation,
    coordinates: Coordinates,
    tier: SeverityTier,
    weight: u8,
}

impl GeocodedPoint {
    /// Classify `observation` and bind it to the resolved `coordinates`.
    pub fn new(observation: Observation, coordinates: Coordinates) -> Self {
        // ---
        let classification = crate::severity::classify(observation.signal_strength);
        Self {
            observation,
            coordinates,
            tier: classification.tier,
            weight: classification.weight,
        }
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn tier(&self) -> SeverityTier {
        self.tier
    }

    pub fn weight(&self) -> u8 {
        self.weight
    }
}
