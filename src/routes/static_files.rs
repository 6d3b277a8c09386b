//! Static file fallback: everything that is not `/health` is looked up under
//! the site root.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::Site;
use crate::error::RequestHandlingError;

// ---

/// Serve `GET /<path>` from the site root.
///
/// Missing files get the file service's own 404, and so do dotfiles such as
/// `.env`. Any other I/O failure is reported as a [`RequestHandlingError`]
/// (HTTP 500).
pub(super) async fn handler(
    State(site): State<Site>,
    request: Request,
) -> Result<Response, RequestHandlingError> {
    // ---
    let path = request.uri().path().to_string();
    if path.split('/').any(|segment| segment.starts_with('.')) {
        tracing::debug!("{} -> hidden path refused", path);
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let mut files = site.files.clone();

    match files.try_call(request).await {
        Ok(response) => {
            tracing::debug!("{} -> {}", path, response.status());
            Ok(response.map(Body::new))
        }
        Err(e) => Err(RequestHandlingError::Io {
            path,
            message: e.to_string(),
        }),
    }
}
