//! Geocoding resolver and caller-side pacing.
//!
//! [`Geocoder::resolve`] issues exactly one request per observation and
//! never retries. The provider response is decoded into a typed struct;
//! anything that does not fit fails closed as a [`ResolutionFailure`].
//!
//! The resolver does not queue or throttle. Callers processing a batch pace
//! consecutive calls with a [`Pacer`] so the provider's rate ceiling holds.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::ResolutionFailure;
use crate::models::{Coordinates, Observation};

// ---

/// Provider status value meaning "request succeeded".
pub const SUCCESS_STATUS: &str = "1";

/// Provider response body.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    // ---
    status: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    geocodes: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    /// `"lng,lat"`
    location: String,
}

/// HTTP client bound to one geocoding endpoint and key.
#[derive(Clone)]
pub struct Geocoder {
    // ---
    client: Client,
    endpoint: String,
    api_key: String,
}

impl Geocoder {
    /// Build a resolver whose every request is bounded by `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        // ---
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Resolve an observation using its preferred lookup address.
    pub async fn resolve(&self, observation: &Observation) -> Result<Coordinates, ResolutionFailure> {
        self.resolve_address(observation.lookup_address()).await
    }

    pub async fn resolve_address(&self, address: &str) -> Result<Coordinates, ResolutionFailure> {
        // ---
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("address", address),
                ("output", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionFailure::Transport(format!(
                "provider answered HTTP {status}"
            )));
        }

        let body = response.text().await?;
        tracing::debug!("Geocode '{}' raw response: {}", address, body);
        parse_response(&body)
    }
}

/// Decode a provider body and accept the first candidate.
pub fn parse_response(body: &str) -> Result<Coordinates, ResolutionFailure> {
    // ---
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| ResolutionFailure::Malformed(e.to_string()))?;

    let info = response.info.unwrap_or_else(|| "no diagnostic provided".to_string());

    if response.status != SUCCESS_STATUS {
        return Err(ResolutionFailure::Provider {
            status: response.status,
            info,
        });
    }

    let first = response
        .geocodes
        .into_iter()
        .next()
        .ok_or(ResolutionFailure::NoCandidates { info })?;

    parse_coordinate_pair(&first.location)
}

/// Parse the provider's `"lng,lat"` pair, rejecting out of range values.
fn parse_coordinate_pair(pair: &str) -> Result<Coordinates, ResolutionFailure> {
    // ---
    let invalid = || ResolutionFailure::InvalidCoordinates(pair.to_string());

    let (lng, lat) = pair.split_once(',').ok_or_else(invalid)?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok(Coordinates { lat, lng })
}

/// Enforces a minimum interval between consecutive resolver calls.
#[derive(Debug)]
pub struct Pacer {
    // ---
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Sleep until `interval` has passed since the previous `wait` returned.
    /// This spaces the starts of consecutive calls, not the gaps between them.
    /// The first call never sleeps.
    pub async fn wait(&mut self) {
        // ---
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
