//! Order API handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use shared::error::AppResult;
use shared::order::{OrderEvent, OrderSnapshot, OrderStatus, ShipmentInfo};
use shared::request::PaginationQuery;
use shared::response::PaginatedResponse;

use crate::core::ServerState;
use crate::orders::{CreateOrderRequest, CreateOrderResponse};

/// Place a new order
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    let response = state.service.create_order(payload).await?;
    Ok(Json(response))
}

/// Filters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListFilter {
    pub customer_id: Option<String>,
    pub status: Option<OrderStatus>,
}

/// List orders, newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<ListFilter>,
    Query(page): Query<PaginationQuery>,
) -> AppResult<Json<PaginatedResponse<OrderSnapshot>>> {
    let orders = state
        .service
        .list_orders(filter.customer_id.as_deref(), filter.status, &page)?;
    Ok(Json(orders))
}

/// Get one order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<OrderSnapshot>> {
    let order = state.service.get_order(&order_id)?;
    Ok(Json(order))
}

/// Get the event history of an order
pub async fn get_events(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<Vec<OrderEvent>>> {
    let events = state.service.get_order_events(&order_id)?;
    Ok(Json(events))
}

/// Cancel request
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default = "default_cancel_reason")]
    pub reason: String,
    #[serde(default = "default_customer_actor")]
    pub actor_id: String,
    #[serde(default = "default_customer_actor")]
    pub actor_name: String,
}

fn default_cancel_reason() -> String {
    "cancelled by customer".to_string()
}

fn default_customer_actor() -> String {
    "customer".to_string()
}

/// Cancel an order
pub async fn cancel(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> AppResult<Json<OrderSnapshot>> {
    let order = state.service.cancel_order(
        &order_id,
        &payload.actor_id,
        &payload.actor_name,
        &payload.reason,
    )?;
    Ok(Json(order))
}

/// Return request
#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default = "default_staff_actor")]
    pub actor_id: String,
    #[serde(default = "default_staff_actor")]
    pub actor_name: String,
}

fn default_staff_actor() -> String {
    "staff".to_string()
}

/// Return a delivered order
pub async fn return_order(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    Json(payload): Json<ReturnRequest>,
) -> AppResult<Json<OrderSnapshot>> {
    let order = state.service.return_order(
        &order_id,
        &payload.actor_id,
        &payload.actor_name,
        payload.reason,
    )?;
    Ok(Json(order))
}

/// Status update request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub shipment: Option<ShipmentInfo>,
    #[serde(default = "default_staff_actor")]
    pub actor_id: String,
    #[serde(default = "default_staff_actor")]
    pub actor_name: String,
}

/// Move an order through fulfilment (processing, shipped, delivered)
pub async fn update_status(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<OrderSnapshot>> {
    let order = state.service.update_status(
        &order_id,
        &payload.actor_id,
        &payload.actor_name,
        payload.status,
        payload.shipment,
    )?;
    Ok(Json(order))
}

/// Request a fresh payment intent for a pending order
pub async fn retry_payment(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<CreateOrderResponse>> {
    let response = state.service.retry_payment(&order_id).await?;
    Ok(Json(response))
}
