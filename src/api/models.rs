use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::into_axum_response;
use crate::state::AppState;

/// List the configured model aliases in OpenAI format.
///
/// Serves the cached body immediately; a lapsed TTL triggers a background
/// refresh from the upstream listing so no request waits on it.
#[must_use]
pub fn handler(state: &Arc<AppState>, headers: &HeaderMap) -> Response {
    if let Err(err) = state.authenticate(headers) {
        return into_axum_response(&err);
    }
    state.maybe_refresh_models();

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        Body::from(state.models_body()),
    )
        .into_response()
}
