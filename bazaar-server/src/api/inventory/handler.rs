//! Inventory API handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use shared::error::{AppError, AppResult, ErrorCode};

use crate::core::ServerState;
use crate::inventory::{SellerSales, StockLevel};

/// One row of the stock listing
#[derive(Debug, Serialize)]
pub struct StockEntry {
    pub product_id: String,
    pub total: i64,
    pub available: i64,
    pub reserved: i64,
}

/// List stock levels for every known product
pub async fn list_stock(State(state): State<ServerState>) -> AppResult<Json<Vec<StockEntry>>> {
    let entries = state
        .reservations
        .all_stock()?
        .into_iter()
        .map(|(product_id, level)| StockEntry {
            product_id,
            total: level.total,
            available: level.available,
            reserved: level.reserved,
        })
        .collect();
    Ok(Json(entries))
}

/// Get the stock level of one product
pub async fn get_stock(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<StockLevel>> {
    let level = state.reservations.stock_level(&product_id)?;
    Ok(Json(level))
}

/// Set stock request
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub available: i64,
}

/// Set the available stock of a product (reserved units are untouched)
pub async fn set_stock(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
    Json(payload): Json<SetStockRequest>,
) -> AppResult<Json<StockLevel>> {
    if payload.available < 0 {
        return Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("available must be non-negative, got {}", payload.available),
        ));
    }
    let level = state.reservations.set_stock(&product_id, payload.available)?;
    Ok(Json(level))
}

/// Accrued sales for one seller
pub async fn seller_sales(
    State(state): State<ServerState>,
    Path(seller_id): Path<String>,
) -> AppResult<Json<SellerSales>> {
    let sales = state.reservations.seller_sales(&seller_id)?;
    Ok(Json(sales))
}
