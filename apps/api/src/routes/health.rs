use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
/// Plain-text liveness banner.
pub async fn root_handler() -> &'static str {
    "Tamil card generator is running"
}

/// GET /health
/// Returns a simple status object with service version and pipeline mode.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "mode": state.pipeline.mode().as_str()
    }))
}
