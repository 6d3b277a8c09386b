//! `signal-mapper`: geocode crowd-reported weak signal observations, classify
//! them by severity, render an interactive coverage map and serve it over a
//! loopback HTTP listener.
//!
//! Data flow: [`loader`] -> [`geocode`] -> [`severity`] -> [`artifact`] ->
//! (file write) -> [`server`]. The [`pipeline`] module drives the first three
//! stages for a batch.

pub mod artifact;
pub mod config;
pub mod error;
pub mod geocode;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod severity;

pub use config::{Config, GeocoderConfig};
pub use error::{
    ArtifactWriteError, RequestHandlingError, ResolutionFailure, SchemaError, ServeError,
};
pub use models::{Coordinates, GeocodedPoint, NetworkType, Observation};
pub use severity::{classify, SeverityTier};
