//! Health check routes
//!
//! | Path    | Method | Description                     |
//! |---------|--------|---------------------------------|
//! | /health | GET    | Liveness plus storage statistics |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::orders::StorageStats;

/// Health routes - public, no resource prefix
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// healthy | degraded
    status: &'static str,
    version: &'static str,
    /// Identifier of this manager instance, changes on restart
    epoch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageStats>,
}

/// Liveness check with event store counters
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let (status, storage) = match state.manager.stats() {
        Ok(stats) => ("healthy", Some(stats)),
        Err(e) => {
            tracing::error!("Health check could not read storage stats: {}", e);
            ("degraded", None)
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        epoch: state.manager.epoch().to_string(),
        storage,
    })
}
