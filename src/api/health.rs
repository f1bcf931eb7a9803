use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::state::AppState;

/// Liveness plus readiness of the upstream credential path.
pub async fn handler(state: &AppState) -> Response {
    let credential_ok = state.credential_healthy().await;
    Json(json!({
        "status": "ok",
        "upstream_credential": if credential_ok { "ready" } else { "unavailable" },
        "config": {
            "models_count": state.config.models.len(),
            "think_tags_mode": state.config.features.think_tags_mode.to_string(),
            "log_level": state.config.features.log_level,
        }
    }))
    .into_response()
}
