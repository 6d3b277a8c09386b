// src/routes/health.rs
//! Health check endpoint for the serving runtime.
//!
//! Lets a controller confirm the listener is answering and whether the
//! artifact has been written yet. Sibling module in the `routes` directory
//! following the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler and response type
//! - Exports to the gateway (`mod.rs`): a subrouter containing `/health`

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::Site;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    artifact: String,
    artifact_present: bool,
}

/// Handle `GET /health`.
async fn health(State(site): State<Site>) -> Json<HealthResponse> {
    // ---
    let artifact_present = tokio::fs::try_exists(site.root().join(site.artifact_file()))
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        artifact: site.artifact_file().to_string(),
        artifact_present,
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<Site> {
    Router::new().route("/health", get(health))
}
