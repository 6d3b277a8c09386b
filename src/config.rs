//! Configuration loader for `signal-mapper`.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
//! Geocoder settings are loaded separately by [`load_geocoder_from_env`]
//! because only the commands that resolve addresses need an API key.
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::artifact::ArtifactOptions;
use crate::loader::ColumnMap;
use crate::models::Coordinates;

/// Parse an optional environment variable into `$ty` with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! string_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Loopback address the serving runtime binds.
    pub host: IpAddr,

    /// First port probed by the serving runtime.
    pub port_start: u16,

    /// Last port probed (inclusive).
    pub port_end: u16,

    /// Directory served as the static root.
    pub serve_root: PathBuf,

    /// Artifact file name, relative to `serve_root`.
    pub artifact_file: String,

    /// Browser map SDK key embedded into the artifact.
    pub map_js_key: String,

    /// Map center used when no point resolved.
    pub map_center: Coordinates,

    /// Header labels of the input file.
    pub columns: ColumnMap,
}

/// Settings for the remote geocoding provider.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    // ---
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Minimum gap between consecutive lookups.
    pub pacing: Duration,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `SERVER_HOST` – loopback bind address (default: 127.0.0.1)
/// - `SERVER_PORT_START` / `SERVER_PORT_END` – port range (default: 8888-8999)
/// - `SERVE_ROOT` – static root (default: `.`)
/// - `ARTIFACT_FILE` – artifact name (default: `signal_coverage_map.html`)
/// - `MAP_JS_KEY` – browser map key (default: empty)
/// - `MAP_CENTER_LAT` / `MAP_CENTER_LNG` – fallback center
/// - `COLUMN_*` – input header labels
///
/// Returns an error if any variable is invalid or the result fails validation.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = ColumnMap::default();
    let columns = ColumnMap {
        location: string_env!("COLUMN_LOCATION", defaults.location),
        detailed_address: string_env!("COLUMN_ADDRESS", defaults.detailed_address),
        network_type: string_env!("COLUMN_NETWORK", defaults.network_type),
        signal_strength: string_env!("COLUMN_SIGNAL", defaults.signal_strength),
        report_time: string_env!("COLUMN_TIME", defaults.report_time),
        reporter: string_env!("COLUMN_REPORTER", defaults.reporter),
        note: string_env!("COLUMN_NOTE", defaults.note),
    };

    let config = Config {
        host: parse_env!("SERVER_HOST", IpAddr, IpAddr::from([127, 0, 0, 1])),
        port_start: parse_env!("SERVER_PORT_START", u16, 8888),
        port_end: parse_env!("SERVER_PORT_END", u16, 8999),
        serve_root: PathBuf::from(string_env!("SERVE_ROOT", ".")),
        artifact_file: string_env!("ARTIFACT_FILE", "signal_coverage_map.html"),
        map_js_key: string_env!("MAP_JS_KEY", ""),
        map_center: Coordinates {
            lat: parse_env!("MAP_CENTER_LAT", f64, 32.0307),
            lng: parse_env!("MAP_CENTER_LNG", f64, 120.8664),
        },
        columns,
    };
    config.validate()?;
    Ok(config)
}

/// Load geocoding provider settings.
///
/// Required:
/// - `GEOCODER_API_KEY` – provider key
///
/// Optional:
/// - `GEOCODER_URL` – endpoint (default: AMap geocode v3)
/// - `GEOCODER_TIMEOUT_SECS` – per request timeout (default: 10)
/// - `GEOCODER_PACING_MS` – gap between lookups (default: 100)
pub fn load_geocoder_from_env() -> Result<GeocoderConfig> {
    // ---
    let api_key = require_env!("GEOCODER_API_KEY");
    if api_key.trim().is_empty() {
        bail!("GEOCODER_API_KEY must not be empty");
    }

    Ok(GeocoderConfig {
        url: string_env!("GEOCODER_URL", "https://restapi.amap.com/v3/geocode/geo"),
        api_key,
        timeout: Duration::from_secs(parse_env!("GEOCODER_TIMEOUT_SECS", u64, 10)),
        pacing: Duration::from_millis(parse_env!("GEOCODER_PACING_MS", u64, 100)),
    })
}

impl Config {
    /// Reject settings that can never work.
    pub fn validate(&self) -> Result<()> {
        // ---
        if !self.host.is_loopback() {
            bail!("SERVER_HOST must be a loopback address, got {}", self.host);
        }
        if self.port_start > self.port_end {
            bail!(
                "SERVER_PORT_START ({}) must not exceed SERVER_PORT_END ({})",
                self.port_start,
                self.port_end
            );
        }
        let stem = self.artifact_file.strip_suffix(".html").unwrap_or_default();
        if stem.is_empty() || self.artifact_file.contains(['/', '\\']) {
            bail!(
                "ARTIFACT_FILE must be a plain file name ending in .html, got '{}'",
                self.artifact_file
            );
        }
        if !(-90.0..=90.0).contains(&self.map_center.lat)
            || !(-180.0..=180.0).contains(&self.map_center.lng)
        {
            bail!("MAP_CENTER_LAT/MAP_CENTER_LNG out of range");
        }
        Ok(())
    }

    /// Where the artifact is written and served from.
    pub fn artifact_path(&self) -> PathBuf {
        self.serve_root.join(&self.artifact_file)
    }

    pub fn artifact_options(&self) -> ArtifactOptions {
        // ---
        ArtifactOptions {
            map_js_key: self.map_js_key.clone(),
            default_center: self.map_center,
            ..ArtifactOptions::default()
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  SERVER_HOST       : {}", self.host);
        tracing::info!("  SERVER_PORT_RANGE : {}-{}", self.port_start, self.port_end);
        tracing::info!("  SERVE_ROOT        : {}", self.serve_root.display());
        tracing::info!("  ARTIFACT_FILE     : {}", self.artifact_file);
        tracing::info!("  MAP_JS_KEY        : {}", mask_secret(&self.map_js_key));
        tracing::info!("  COLUMNS           : {:?}", self.columns);
    }
}

impl GeocoderConfig {
    /// Log provider settings with the key masked.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Geocoder configuration:");
        tracing::info!("  GEOCODER_URL      : {}", self.url);
        tracing::info!("  GEOCODER_API_KEY  : {}", mask_secret(&self.api_key));
        tracing::info!("  TIMEOUT           : {:?}", self.timeout);
        tracing::info!("  PACING            : {:?}", self.pacing);
    }
}

/// Keep only the last four characters of a secret.
fn mask_secret(secret: &str) -> String {
    // ---
    let count = secret.chars().count();
    if count == 0 {
        return "(unset)".to_string();
    }
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}
