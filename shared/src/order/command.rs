//! Order commands - requests to modify order state
//!
//! Commands are idempotent by `command_id`: replaying a command that has
//! already been processed is acknowledged without re-applying it.

use super::snapshot::OrderStatus;
use super::types::{Address, OrderLine, PaymentMethod, Pricing, ShipmentInfo};
use serde::{Deserialize, Serialize};

/// Order command envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommand {
    /// Command unique ID (idempotency key)
    pub command_id: String,
    /// Actor issuing the command (customer, seller, or system)
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    /// Client timestamp (Unix milliseconds) - for audit, may have clock skew
    pub timestamp: i64,
    /// Command payload
    pub payload: OrderCommandPayload,
}

impl OrderCommand {
    /// Create a new command with a fresh command ID
    pub fn new(
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        payload: OrderCommandPayload,
    ) -> Self {
        Self {
            command_id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            timestamp: crate::util::now_millis(),
            payload,
        }
    }

    /// Order this command targets, if it targets an existing order
    pub fn order_id(&self) -> Option<&str> {
        self.payload.order_id()
    }
}

/// Command payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderCommandPayload {
    /// Place a new order (items already re-priced from the catalog)
    PlaceOrder {
        customer_id: String,
        items: Vec<OrderLine>,
        shipping_address: Address,
        billing_address: Address,
        payment_method: PaymentMethod,
        pricing: Pricing,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    /// Attach the gateway order reference after intent creation
    RecordPaymentIntent {
        order_id: String,
        gateway_order_ref: String,
    },

    /// Settle a verified online payment
    SettlePayment {
        order_id: String,
        gateway_order_ref: String,
        gateway_payment_ref: String,
    },

    /// Record a failed or rejected settlement attempt
    RecordPaymentFailure {
        order_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        gateway_order_ref: Option<String>,
        reason: String,
    },

    /// Advance fulfilment status (processing, shipped, delivered)
    UpdateStatus {
        order_id: String,
        status: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        shipment: Option<ShipmentInfo>,
    },

    /// Cancel the order before shipment
    CancelOrder { order_id: String, reason: String },

    /// Register a post-delivery return
    ReturnOrder {
        order_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl OrderCommandPayload {
    /// Order this payload targets (None for PlaceOrder, which creates one)
    pub fn order_id(&self) -> Option<&str> {
        match self {
            OrderCommandPayload::PlaceOrder { .. } => None,
            OrderCommandPayload::RecordPaymentIntent { order_id, .. }
            | OrderCommandPayload::SettlePayment { order_id, .. }
            | OrderCommandPayload::RecordPaymentFailure { order_id, .. }
            | OrderCommandPayload::UpdateStatus { order_id, .. }
            | OrderCommandPayload::CancelOrder { order_id, .. }
            | OrderCommandPayload::ReturnOrder { order_id, .. } => Some(order_id),
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommandPayload::PlaceOrder { .. } => "PLACE_ORDER",
            OrderCommandPayload::RecordPaymentIntent { .. } => "RECORD_PAYMENT_INTENT",
            OrderCommandPayload::SettlePayment { .. } => "SETTLE_PAYMENT",
            OrderCommandPayload::RecordPaymentFailure { .. } => "RECORD_PAYMENT_FAILURE",
            OrderCommandPayload::UpdateStatus { .. } => "UPDATE_STATUS",
            OrderCommandPayload::CancelOrder { .. } => "CANCEL_ORDER",
            OrderCommandPayload::ReturnOrder { .. } => "RETURN_ORDER",
        }
    }
}
