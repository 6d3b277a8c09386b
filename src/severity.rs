//! Signal severity classification.
//!
//! Maps the 1-10 crowd-reported signal scale onto four tiers and a heat
//! weight. Weaker signal means a higher weight, so severe blind spots dominate
//! the heat overlay.

use serde::Serialize;

// ---

/// Ordered from worst to best signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeverityTier {
    Severe,
    Poor,
    Fair,
    Good,
}

impl SeverityTier {
    /// All tiers in legend order.
    pub const ALL: [SeverityTier; 4] = [
        SeverityTier::Severe,
        SeverityTier::Poor,
        SeverityTier::Fair,
        SeverityTier::Good,
    ];

    /// Marker and legend color.
    pub fn color(self) -> &'static str {
        // ---
        match self {
            SeverityTier::Severe => "#dc3545",
            SeverityTier::Poor => "#fd7e14",
            SeverityTier::Fair => "#ffc107",
            SeverityTier::Good => "#28a745",
        }
    }

    pub fn label(self) -> &'static str {
        // ---
        match self {
            SeverityTier::Severe => "Severe blind spot",
            SeverityTier::Poor => "Poor signal",
            SeverityTier::Fair => "Fair signal",
            SeverityTier::Good => "Good signal",
        }
    }

    /// Inclusive strength range shown in the legend.
    pub fn strength_range(self) -> (i32, i32) {
        // ---
        match self {
            SeverityTier::Severe => (1, 2),
            SeverityTier::Poor => (3, 4),
            SeverityTier::Fair => (5, 6),
            SeverityTier::Good => (7, 10),
        }
    }
}

/// Result of classifying one signal strength value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: SeverityTier,
    /// Heat weight in 1..=10.
    pub weight: u8,
    pub color: &'static str,
}

/// Classify a signal strength. Total over `i32`: values outside 1-10 clamp to
/// the nearest boundary tier and weight.
pub fn classify(signal_strength: i32) -> Classification {
    // ---
    let strength = signal_strength.clamp(1, 10);
    let tier = match strength {
        1..=2 => SeverityTier::Severe,
        3..=4 => SeverityTier::Poor,
        5..=6 => SeverityTier::Fair,
        _ => SeverityTier::Good,
    };

    Classification {
        tier,
        weight: heat_weight(strength),
        color: tier.color(),
    }
}

/// `max(1, 11 - strength)`, clamped into 1..=10.
pub fn heat_weight(signal_strength: i32) -> u8 {
    // ---
    (11 - signal_strength.clamp(1, 10)).max(1) as u8
}
