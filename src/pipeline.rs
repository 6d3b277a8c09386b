//! Batch driver: geocode and classify loaded observations.
//!
//! Runs sequentially on the calling task. Each resolver call is preceded by
//! [`Pacer::wait`]. Failures are collected as [`SkippedRecord`]s and never
//! abort the batch; output order follows input order.

use crate::error::ResolutionFailure;
use crate::geocode::{Geocoder, Pacer};
use crate::models::{Coordinates, GeocodedPoint, Observation};

// ---

/// An observation dropped because its address did not resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// 1-based position in the input batch.
    pub row: usize,
    pub address: String,
    pub reason: ResolutionFailure,
}

/// Result of running one batch through the resolver and classifier.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub points: Vec<GeocodedPoint>,
    pub skipped: Vec<SkippedRecord>,
}

impl BatchOutcome {
    /// Sort one resolver result into `points` or `skipped`.
    pub fn record(
        &mut self,
        row: usize,
        observation: Observation,
        result: Result<Coordinates, ResolutionFailure>,
    ) {
        // ---
        match result {
            Ok(coordinates) => self.points.push(GeocodedPoint::new(observation, coordinates)),
            Err(reason) => {
                tracing::warn!(
                    "Skipping row {} ({}): {}",
                    row,
                    observation.lookup_address(),
                    reason
                );
                self.skipped.push(SkippedRecord {
                    row,
                    address: observation.lookup_address().to_string(),
                    reason,
                });
            }
        }
    }
}

/// Resolve every observation in order, pacing calls with `pacer`.
pub async fn geocode_batch(
    observations: Vec<Observation>,
    geocoder: &Geocoder,
    pacer: &mut Pacer,
) -> BatchOutcome {
    // ---
    let total = observations.len();
    let mut outcome = BatchOutcome::default();

    for (i, observation) in observations.into_iter().enumerate() {
        let row = i + 1;
        tracing::debug!("Resolving {}/{}: {}", row, total, observation.location);

        pacer.wait().await;
        let result = geocoder.resolve(&observation).await;
        outcome.record(row, observation, result);
    }

    tracing::info!(
        "Geocoded {} of {} observations ({} skipped)",
        outcome.points.len(),
        total,
        outcome.skipped.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::NetworkType;
    use crate::severity::SeverityTier;

    fn observation(location: &str, strength: i32) -> Observation {
        // ---
        Observation {
            location: location.to_string(),
            detailed_address: None,
            network_type: NetworkType::FiveG,
            signal_strength: strength,
            report_time: "2024-05-01".to_string(),
            reporter: "Lin".to_string(),
            note: "-".to_string(),
        }
    }

    #[test]
    fn record_splits_points_and_skips() {
        // ---
        let mut outcome = BatchOutcome::default();
        outcome.record(1, observation("A", 1), Ok(Coordinates { lat: 1.0, lng: 2.0 }));
        outcome.record(2, observation("B", 5), Err(ResolutionFailure::Timeout));
        outcome.record(3, observation("C", 8), Ok(Coordinates { lat: 3.0, lng: 4.0 }));

        assert_eq!(outcome.points.len(), 2);
        assert_eq!(outcome.points[0].observation().location, "A");
        assert_eq!(outcome.points[0].tier(), SeverityTier::Severe);
        assert_eq!(outcome.points[1].observation().location, "C");

        assert_eq!(
            outcome.skipped,
            vec![SkippedRecord {
                row: 2,
                address: "B".to_string(),
                reason: ResolutionFailure::Timeout,
            }]
        );
    }
}
