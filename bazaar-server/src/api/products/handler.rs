//! Product API handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use shared::error::{AppError, AppResult, ErrorCode};

use crate::catalog::CatalogProduct;
use crate::core::ServerState;
use crate::orders::pricing::validate_unit_price;

/// Create or replace a product
#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "seller_id is required"))]
    pub seller_id: String,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_purchasable")]
    pub is_purchasable: bool,
}

fn default_purchasable() -> bool {
    true
}

/// Insert or replace a product in the catalog
pub async fn upsert(
    State(state): State<ServerState>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<Json<CatalogProduct>> {
    payload
        .validate()
        .map_err(|err| AppError::business_rule(err.to_string()))?;
    validate_unit_price(payload.price).map_err(|err| {
        AppError::with_message(ErrorCode::ProductInvalidPrice, err.to_string())
            .with_detail("product_id", payload.product_id.clone())
    })?;

    let product = CatalogProduct {
        product_id: payload.product_id,
        seller_id: payload.seller_id,
        name: payload.name,
        description: payload.description,
        price: payload.price,
        is_purchasable: payload.is_purchasable,
        // stamped by the store
        created_at: 0,
        updated_at: 0,
    };

    let stored = state.catalog.upsert_product(&product)?;
    Ok(Json(stored))
}

/// List all products
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<CatalogProduct>>> {
    let products = state.catalog.list_products()?;
    Ok(Json(products))
}

/// Get one product by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<CatalogProduct>> {
    let product = state.catalog.get_product(&product_id)?.ok_or_else(|| {
        AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", product_id.clone())
    })?;
    Ok(Json(product))
}

/// Purchasability request
#[derive(Debug, Deserialize)]
pub struct SetPurchasableRequest {
    pub is_purchasable: bool,
}

/// Show or hide a product for purchase without deleting it
pub async fn set_purchasable(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
    Json(payload): Json<SetPurchasableRequest>,
) -> AppResult<Json<CatalogProduct>> {
    state
        .catalog
        .set_purchasable(&product_id, payload.is_purchasable)?;
    let product = state.catalog.get_product(&product_id)?.ok_or_else(|| {
        AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", product_id.clone())
    })?;
    Ok(Json(product))
}
