//! Order API module
//!
//! Placement, queries, and lifecycle transitions. Every mutation goes
//! through [`crate::orders::OrderService`]; handlers never touch storage.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/{order_id}", get(handler::get_by_id))
        .route("/{order_id}/events", get(handler::get_events))
        .route("/{order_id}/cancel", post(handler::cancel))
        .route("/{order_id}/return", post(handler::return_order))
        .route("/{order_id}/status", post(handler::update_status))
        .route("/{order_id}/payment", post(handler::retry_payment))
}
