//! Inventory API module

mod handler;

use axum::{
    Router,
    routing::get,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/inventory", stock_routes())
        .nest("/api/sellers", seller_routes())
}

fn stock_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list_stock))
        .route(
            "/{product_id}/stock",
            get(handler::get_stock).put(handler::set_stock),
        )
}

fn seller_routes() -> Router<ServerState> {
    Router::new().route("/{seller_id}/sales", get(handler::seller_sales))
}
