//! API routes
//!
//! # Structure
//!
//! - [`health`] - liveness and storage statistics
//! - [`products`] - catalog management
//! - [`inventory`] - stock levels and seller sales
//! - [`orders`] - order placement and lifecycle
//! - [`payments`] - gateway callback and webhook endpoints
//!
//! Each resource module exposes a `router()` that nests its routes under
//! `/api/...`; [`build_app`] merges them into the application router.

pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;

use axum::Router;

use crate::core::ServerState;

/// Build the Axum router (without state)
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(products::router())
        .merge(inventory::router())
        .merge(orders::router())
        .merge(payments::router())
}
