//! Payment API module
//!
//! Endpoints the gateway side calls back into: the browser-redirect
//! callback and the server-to-server webhook. Both are signature-checked
//! before anything is trusted.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Payment router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/callback", post(handler::callback))
        .route("/webhook", post(handler::webhook))
}
