//! Record loader: parses a CSV export of weak signal reports into
//! [`Observation`]s.
//!
//! Header names are matched case-sensitively against a configurable
//! [`ColumnMap`]. A missing required column, or a required cell that is empty
//! or unparseable, rejects the whole batch. Empty optional cells become
//! [`UNKNOWN`]. No network access.

use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::SchemaError;
use crate::models::{NetworkType, Observation, UNKNOWN};

// ---

/// Header labels for each field. Deployments may localize these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    // ---
    pub location: String,
    pub detailed_address: String,
    pub network_type: String,
    pub signal_strength: String,
    pub report_time: String,
    pub reporter: String,
    pub note: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        // ---
        Self {
            location: "location".to_string(),
            detailed_address: "detailed_address".to_string(),
            network_type: "network_type".to_string(),
            signal_strength: "signal_strength".to_string(),
            report_time: "report_time".to_string(),
            reporter: "reporter".to_string(),
            note: "note".to_string(),
        }
    }
}

/// Load observations from a CSV file on disk.
pub fn load(path: &Path, columns: &ColumnMap) -> Result<Vec<Observation>, SchemaError> {
    // ---
    tracing::info!("Loading observations from {}", path.display());
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)?;
    let observations = read_observations(reader, columns)?;
    tracing::info!("Loaded {} observations", observations.len());
    Ok(observations)
}

/// Load observations from any CSV byte stream.
pub fn load_from_reader<R: io::Read>(
    input: R,
    columns: &ColumnMap,
) -> Result<Vec<Observation>, SchemaError> {
    // ---
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input);
    read_observations(reader, columns)
}

fn read_observations<R: io::Read>(
    mut reader: csv::Reader<R>,
    columns: &ColumnMap,
) -> Result<Vec<Observation>, SchemaError> {
    // ---
    let headers = reader.headers()?.clone();
    let layout = ColumnLayout::resolve(&headers, columns)?;

    let mut observations = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        observations.push(layout.observation(&record, i + 1)?);
    }
    Ok(observations)
}

/// Header positions resolved against a [`ColumnMap`].
struct ColumnLayout<'a> {
    // ---
    columns: &'a ColumnMap,
    location: usize,
    network_type: usize,
    signal_strength: usize,
    detailed_address: Option<usize>,
    report_time: Option<usize>,
    reporter: Option<usize>,
    note: Option<usize>,
}

impl<'a> ColumnLayout<'a> {
    fn resolve(headers: &StringRecord, columns: &'a ColumnMap) -> Result<Self, SchemaError> {
        // ---
        let position = |name: &str| headers.iter().position(|h| h == name);

        let location = position(&columns.location);
        let network_type = position(&columns.network_type);
        let signal_strength = position(&columns.signal_strength);

        let missing: Vec<String> = [
            (&columns.location, location),
            (&columns.network_type, network_type),
            (&columns.signal_strength, signal_strength),
        ]
        .into_iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name.clone())
        .collect();

        match (location, network_type, signal_strength) {
            (Some(location), Some(network_type), Some(signal_strength)) => Ok(Self {
                columns,
                location,
                network_type,
                signal_strength,
                detailed_address: position(&columns.detailed_address),
                report_time: position(&columns.report_time),
                reporter: position(&columns.reporter),
                note: position(&columns.note),
            }),
            _ => {
                tracing::error!("Input headers: {:?}", headers.iter().collect::<Vec<_>>());
                Err(SchemaError::MissingColumns { missing })
            }
        }
    }

    fn observation(&self, record: &StringRecord, row: usize) -> Result<Observation, SchemaError> {
        // ---
        let location = self.required(record, self.location, &self.columns.location, row)?;

        let raw_network =
            self.required(record, self.network_type, &self.columns.network_type, row)?;
        let network_type =
            raw_network
                .parse::<NetworkType>()
                .map_err(|_| SchemaError::InvalidField {
                    row,
                    column: self.columns.network_type.clone(),
                    value: raw_network.clone(),
                    reason: "expected one of 5G, 4G, 3G",
                })?;

        let raw_signal =
            self.required(record, self.signal_strength, &self.columns.signal_strength, row)?;
        let signal_strength = parse_strength(&raw_signal).ok_or_else(|| SchemaError::InvalidField {
            row,
            column: self.columns.signal_strength.clone(),
            value: raw_signal.clone(),
            reason: "expected an integer",
        })?;

        Ok(Observation {
            location,
            detailed_address: self.optional(record, self.detailed_address),
            network_type,
            signal_strength,
            report_time: self.or_unknown(record, self.report_time),
            reporter: self.or_unknown(record, self.reporter),
            note: self.or_unknown(record, self.note),
        })
    }

    fn required(
        &self,
        record: &StringRecord,
        idx: usize,
        column: &str,
        row: usize,
    ) -> Result<String, SchemaError> {
        // ---
        cell(record, Some(idx)).ok_or_else(|| SchemaError::MissingField {
            row,
            column: column.to_string(),
        })
    }

    fn optional(&self, record: &StringRecord, idx: Option<usize>) -> Option<String> {
        cell(record, idx)
    }

    fn or_unknown(&self, record: &StringRecord, idx: Option<usize>) -> String {
        cell(record, idx).unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Non-empty, non-sentinel cell contents.
fn cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    // ---
    let value = record.get(idx?)?.trim();
    if is_null_sentinel(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Spreadsheet exports write blanks as empty strings or `nan`/`null`.
fn is_null_sentinel(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null")
}

/// Accepts `"7"` and integral floats such as `"7.0"`.
fn parse_strength(raw: &str) -> Option<i32> {
    // ---
    if let Ok(v) = raw.parse::<i32>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        Some(v as i32)
    } else {
        None
    }
}
