//! Route groups of the API.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use super::state::AppState;

pub mod download;
pub mod gitlab;
pub mod stac;
pub mod store;

/// Liveness probe.
pub fn status_routes() -> Router<AppState> {
    Router::new().route("/api/status", get(status))
}

async fn status() -> Json<Value> {
    Json(json!([{"status": "ok"}]))
}
