//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether the todo cache holds a live connection
    pub ready: bool,
    pub database: String,
    pub store: String,
    pub timestamp: String,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ready = state.todos.cache().await.is_ready();

    Json(HealthResponse {
        status: if ready { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready,
        database: state.config.database.clone(),
        store: state.config.store.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Shelf Todo Server"
}
