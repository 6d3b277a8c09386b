//! Visualization artifact builder.
//!
//! Turns geocoded points into one self-contained HTML document: the point
//! list and statistics are embedded as JSON for client-side rendering, and
//! the legend and summary panel are rendered here. Marker icons and the heat
//! overlay are drawn in the browser from each point's tier color and weight.
//!
//! Output is reproducible for the same input order except for the
//! generation timestamp.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::ArtifactWriteError;
use crate::models::{Coordinates, GeocodedPoint};
use crate::severity::SeverityTier;

// ---

const TEMPLATE: &str = include_str!("template.html");

/// Aggregate statistics over the geocoded points of one build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    // ---
    pub total_points: usize,
    pub severe_count: usize,
    /// Mean reported strength; 0.0 when there are no points.
    pub avg_signal: f64,
    /// Share of points per network label, in percent.
    pub network_coverage_pct: BTreeMap<String, f64>,
}

impl Statistics {
    pub fn compute(points: &[GeocodedPoint]) -> Self {
        // ---
        let total_points = points.len();
        if total_points == 0 {
            return Self {
                total_points: 0,
                severe_count: 0,
                avg_signal: 0.0,
                network_coverage_pct: BTreeMap::new(),
            };
        }

        let severe_count = points
            .iter()
            .filter(|p| p.tier() == SeverityTier::Severe)
            .count();

        let signal_sum: i64 = points
            .iter()
            .map(|p| p.observation().signal_strength as i64)
            .sum();

        let mut per_network: BTreeMap<String, usize> = BTreeMap::new();
        for p in points {
            *per_network
                .entry(p.observation().network_type.label().to_string())
                .or_default() += 1;
        }

        Self {
            total_points,
            severe_count,
            avg_signal: signal_sum as f64 / total_points as f64,
            network_coverage_pct: per_network
                .into_iter()
                .map(|(net, n)| (net, n as f64 * 100.0 / total_points as f64))
                .collect(),
        }
    }
}

/// One embedded point, in the shape the map script consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRecord {
    // ---
    pub name: String,
    pub address: String,
    pub lng: f64,
    pub lat: f64,
    pub signal: i32,
    pub network: String,
    pub reporter: String,
    pub time: String,
    pub note: String,
    pub tier: SeverityTier,
    pub tier_label: &'static str,
    pub color: &'static str,
    pub weight: u8,
}

impl From<&GeocodedPoint> for PointRecord {
    fn from(point: &GeocodedPoint) -> Self {
        // ---
        let obs = point.observation();
        let Coordinates { lat, lng } = point.coordinates();
        Self {
            name: obs.location.clone(),
            address: obs.lookup_address().to_string(),
            lng,
            lat,
            signal: obs.signal_strength,
            network: obs.network_type.label().to_string(),
            reporter: obs.reporter.clone(),
            time: obs.report_time.clone(),
            note: obs.note.clone(),
            tier: point.tier(),
            tier_label: point.tier().label(),
            color: point.tier().color(),
            weight: point.weight(),
        }
    }
}

/// Presentation settings for the rendered map.
#[derive(Debug, Clone)]
pub struct ArtifactOptions {
    pub title: String,
    /// Browser map SDK key; may be empty.
    pub map_js_key: String,
    /// Map center when there are no points.
    pub default_center: Coordinates,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        // ---
        Self {
            title: "Signal Blind Spot Map".to_string(),
            map_js_key: String::new(),
            default_center: Coordinates {
                lat: 32.0307,
                lng: 120.8664,
            },
        }
    }
}

/// A rendered artifact together with the data embedded in it.
#[derive(Debug, Clone)]
pub struct Document {
    pub html: String,
    pub points: Vec<PointRecord>,
    pub statistics: Statistics,
}

impl Document {
    /// Persist the document, replacing `path` atomically via a sibling temp file.
    pub fn write_to(&self, path: &Path) -> Result<(), ArtifactWriteError> {
        // ---
        let wrap = |source| ArtifactWriteError {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, &self.html).map_err(wrap)?;
        std::fs::rename(&tmp, path).map_err(wrap)?;

        tracing::info!(
            "Wrote artifact {} ({} points, {} bytes)",
            path.display(),
            self.statistics.total_points,
            self.html.len()
        );
        Ok(())
    }
}

/// Build a document stamped with the current local time.
pub fn build(points: &[GeocodedPoint], options: &ArtifactOptions) -> Document {
    build_at(points, options, Local::now())
}

/// Build a document with an explicit generation timestamp.
pub fn build_at(
    points: &[GeocodedPoint],
    options: &ArtifactOptions,
    generated_at: DateTime<Local>,
) -> Document {
    // ---
    let statistics = Statistics::compute(points);
    let records: Vec<PointRecord> = points.iter().map(PointRecord::from).collect();

    if records.is_empty() {
        tracing::warn!("Building artifact with no points; map will have no markers");
    }

    let html = TEMPLATE
        .replace("__TITLE__", &escape_html(&options.title))
        .replace("__MAP_JS_KEY__", &escape_html(&options.map_js_key))
        .replace("__LEGEND__", &render_legend())
        .replace("__SUMMARY__", &render_summary(&statistics))
        .replace(
            "__GENERATED_AT__",
            &generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
        .replace("__DEFAULT_CENTER__", &script_json(&options.default_center))
        .replace("__STATISTICS__", &script_json(&statistics))
        .replace("__SIGNAL_DATA__", &script_json(&records));

    Document {
        html,
        points: records,
        statistics,
    }
}

fn render_legend() -> String {
    // ---
    let mut out = String::new();
    for tier in SeverityTier::ALL {
        let (lo, hi) = tier.strength_range();
        let _ = writeln!(
            out,
            "            <div class=\"legend-item\" data-tier=\"{tier:?}\">\
             <div class=\"legend-color\" style=\"background-color: {}\"></div>\
             <span class=\"legend-text\">{} ({lo}-{hi})</span></div>",
            tier.color(),
            tier.label(),
        );
    }
    out
}

fn render_summary(stats: &Statistics) -> String {
    // ---
    let mut items = vec![
        (stats.total_points.to_string(), "Observation points".to_string()),
        (stats.severe_count.to_string(), "Severe blind spots".to_string()),
        (format!("{:.1}", stats.avg_signal), "Average strength".to_string()),
    ];
    for (network, pct) in &stats.network_coverage_pct {
        items.push((format!("{pct:.0}%"), format!("{} coverage", escape_html(network))));
    }

    let mut out = String::new();
    for (value, label) in items {
        let _ = writeln!(
            out,
            "                <div class=\"stat-item\"><span class=\"stat-number\">{value}</span>\
             <span class=\"stat-label\">{label}</span></div>"
        );
    }
    out
}

/// Serialize for embedding inside a `<script>` element.
fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    // ---
    // Serialization of these plain structs cannot fail; fall back to null regardless.
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
}

fn escape_html(s: &str) -> String {
    // ---
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
