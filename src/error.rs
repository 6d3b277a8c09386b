//! Error taxonomy for the signal mapping pipeline and serving runtime.
//!
//! Fatal errors (`SchemaError`, `ArtifactWriteError`, `ServeError`) are
//! returned to the controller. `ResolutionFailure` and `RequestHandlingError`
//! are per-record / per-request and never abort the enclosing operation.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// ---

/// Input batch rejected by the record loader.
#[derive(Debug, Error)]
pub enum SchemaError {
    // ---
    #[error("failed to read input: {0}")]
    Read(#[from] csv::Error),

    /// Every required column that is absent, reported together.
    #[error("input is missing required column(s): {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("row {row}: required field '{column}' is empty")]
    MissingField { row: usize, column: String },

    #[error("row {row}: invalid value '{value}' in column '{column}': {reason}")]
    InvalidField {
        row: usize,
        column: String,
        value: String,
        reason: &'static str,
    },
}

/// A single observation could not be turned into coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionFailure {
    // ---
    /// Provider answered but reported a non-success status.
    #[error("provider rejected address (status {status}): {info}")]
    Provider { status: String, info: String },

    #[error("provider returned no candidates: {info}")]
    NoCandidates { info: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// Body did not match the expected response shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid coordinate pair '{0}'")]
    InvalidCoordinates(String),
}

impl From<reqwest::Error> for ResolutionFailure {
    fn from(e: reqwest::Error) -> Self {
        // ---
        if e.is_timeout() {
            ResolutionFailure::Timeout
        } else if e.is_decode() {
            ResolutionFailure::Malformed(e.to_string())
        } else {
            ResolutionFailure::Transport(e.to_string())
        }
    }
}

/// The rendered document could not be persisted.
#[derive(Debug, Error)]
#[error("failed to write artifact to {}: {source}", .path.display())]
pub struct ArtifactWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Serving runtime failed to start.
#[derive(Debug, Error)]
pub enum ServeError {
    // ---
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("invalid port range {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while answering one HTTP request; rendered as a 500.
#[derive(Debug, Error)]
pub enum RequestHandlingError {
    // ---
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    /// A handler panicked. The request URI is on the enclosing trace span.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl IntoResponse for RequestHandlingError {
    fn into_response(self) -> Response {
        // ---
        tracing::error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal Server Error\n{self}\n"),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn missing_columns_are_reported_together() {
        // ---
        let err = SchemaError::MissingColumns {
            missing: vec!["network_type".into(), "signal_strength".into()],
        };
        assert_eq!(
            err.to_string(),
            "input is missing required column(s): network_type, signal_strength"
        );
    }

    #[tokio::test]
    async fn request_error_renders_plain_500() {
        // ---
        let err = RequestHandlingError::Io {
            path: "/map.html".into(),
            message: "permission denied".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("/map.html: permission denied"));
    }
}
