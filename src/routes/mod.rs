//! HTTP surface of the serving runtime (EMBP gateway).
//!
//! Every response carries `Cache-Control: no-cache` so a regenerated artifact
//! shows up on the next reload. Panics inside a handler become a 500 with a
//! plain diagnostic body instead of tearing down the connection task.

use std::any::Any;
use std::path::{Path, PathBuf};

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, services::ServeDir, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::error::RequestHandlingError;

mod health;
mod static_files;

// ---

/// Shared state for all routes: the static root and the artifact it holds.
#[derive(Clone)]
pub struct Site {
    // ---
    root: PathBuf,
    artifact_file: String,
    files: ServeDir,
}

impl Site {
    pub fn new(root: impl Into<PathBuf>, artifact_file: impl Into<String>) -> Self {
        // ---
        let root = root.into();
        Self {
            files: ServeDir::new(&root),
            root,
            artifact_file: artifact_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_file(&self) -> &str {
        &self.artifact_file
    }
}

pub fn router(site: Site) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .fallback(static_files::handler)
        .with_state(site)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    // ---
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "non-string panic payload".to_string()
    };

    RequestHandlingError::Panicked(message).into_response()
}
