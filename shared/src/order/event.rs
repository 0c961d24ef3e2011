//! Order events - immutable facts recorded after command processing

use super::snapshot::OrderStatus;
use super::types::{
    Address, OrderLine, PaymentMethod, Pricing, RefundStatus, ShipmentInfo,
};
use serde::{Deserialize, Serialize};

/// Order event - immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event unique ID
    pub event_id: String,
    /// Global sequence number (for ordering and replay)
    /// This is the AUTHORITATIVE ordering mechanism for state evolution
    pub sequence: u64,
    /// Order this event belongs to
    pub order_id: String,
    /// Server timestamp (Unix milliseconds) - AUTHORITATIVE for state evolution
    /// Always set by server when event is created
    pub timestamp: i64,
    /// Client timestamp (Unix milliseconds) - for audit and debugging
    /// Preserved from original command, may differ from server time due to clock skew
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<i64>,
    /// Actor who triggered this event
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    /// Command that triggered this event (for audit tracing)
    pub command_id: String,
    /// Event type
    pub event_type: OrderEventType,
    /// Event payload
    pub payload: EventPayload,
}

/// Event type enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    // Lifecycle
    OrderCreated,
    OrderCancelled,
    OrderReturned,

    // Payments
    PaymentInitiated,
    PaymentSettled,
    PaymentFailed,

    // Fulfilment
    OrderProcessing,
    OrderShipped,
    OrderDelivered,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderEventType::OrderCreated => write!(f, "ORDER_CREATED"),
            OrderEventType::OrderCancelled => write!(f, "ORDER_CANCELLED"),
            OrderEventType::OrderReturned => write!(f, "ORDER_RETURNED"),
            OrderEventType::PaymentInitiated => write!(f, "PAYMENT_INITIATED"),
            OrderEventType::PaymentSettled => write!(f, "PAYMENT_SETTLED"),
            OrderEventType::PaymentFailed => write!(f, "PAYMENT_FAILED"),
            OrderEventType::OrderProcessing => write!(f, "ORDER_PROCESSING"),
            OrderEventType::OrderShipped => write!(f, "ORDER_SHIPPED"),
            OrderEventType::OrderDelivered => write!(f, "ORDER_DELIVERED"),
        }
    }
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // ========== Lifecycle ==========
    OrderCreated {
        customer_id: String,
        /// Complete priced line items
        items: Vec<OrderLine>,
        shipping_address: Address,
        billing_address: Address,
        pricing: Pricing,
        payment_method: PaymentMethod,
        /// Status the order is created in (PENDING, or CONFIRMED for
        /// cash on delivery)
        status: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    OrderCancelled {
        reason: String,
        /// Whether a captured payment needs refunding
        refund_status: RefundStatus,
    },

    OrderReturned {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // ========== Payments ==========
    PaymentInitiated {
        gateway_order_ref: String,
    },

    PaymentSettled {
        gateway_order_ref: String,
        gateway_payment_ref: String,
        /// Settlement timestamp (Unix milliseconds)
        paid_at: i64,
    },

    PaymentFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        gateway_order_ref: Option<String>,
        reason: String,
    },

    // ========== Fulfilment ==========
    OrderProcessing {},

    OrderShipped {
        shipment: ShipmentInfo,
    },

    OrderDelivered {},
}

impl OrderEvent {
    /// Create a new event
    ///
    /// # Arguments
    /// * `sequence` - Global sequence number (authoritative ordering)
    /// * `order_id` - Order this event belongs to
    /// * `actor_id` - Actor who triggered this event
    /// * `actor_name` - Actor name (snapshot for audit)
    /// * `command_id` - Command that triggered this event
    /// * `client_timestamp` - Client-provided timestamp (for audit, may have clock skew)
    /// * `event_type` - Event type
    /// * `payload` - Event payload
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        order_id: String,
        actor_id: String,
        actor_name: String,
        command_id: String,
        client_timestamp: Option<i64>,
        event_type: OrderEventType,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            sequence,
            order_id,
            // Server timestamp is ALWAYS set by server - this is authoritative
            timestamp: chrono::Utc::now().timestamp_millis(),
            // Client timestamp preserved for audit (may differ due to clock skew)
            client_timestamp,
            actor_id,
            actor_name,
            command_id,
            event_type,
            payload,
        }
    }

    /// Create event from command (extracts metadata including client timestamp)
    pub fn from_command(
        sequence: u64,
        order_id: String,
        command: &super::OrderCommand,
        event_type: OrderEventType,
        payload: EventPayload,
    ) -> Self {
        Self::new(
            sequence,
            order_id,
            command.actor_id.clone(),
            command.actor_name.clone(),
            command.command_id.clone(),
            Some(command.timestamp),
            event_type,
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(OrderEventType::OrderCreated.to_string(), "ORDER_CREATED");
        assert_eq!(
            OrderEventType::PaymentSettled.to_string(),
            "PAYMENT_SETTLED"
        );
        assert_eq!(OrderEventType::OrderShipped.to_string(), "ORDER_SHIPPED");
    }

    #[test]
    fn test_event_payload_tag() {
        let payload = EventPayload::PaymentSettled {
            gateway_order_ref: "gw_ord_1".to_string(),
            gateway_payment_ref: "gw_pay_1".to_string(),
            paid_at: 1_724_500_000_000,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"PAYMENT_SETTLED\""));

        let parsed: EventPayload = serde_json::from_str(&json).unwrap();
        match parsed {
            EventPayload::PaymentSettled {
                gateway_payment_ref,
                ..
            } => assert_eq!(gateway_payment_ref, "gw_pay_1"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_event_from_command_keeps_client_timestamp() {
        let command = super::super::OrderCommand::new(
            "system",
            "expiry sweeper",
            super::super::OrderCommandPayload::CancelOrder {
                order_id: "ORD-1".to_string(),
                reason: "payment window expired".to_string(),
            },
        );

        let event = OrderEvent::from_command(
            42,
            "ORD-1".to_string(),
            &command,
            OrderEventType::OrderCancelled,
            EventPayload::OrderCancelled {
                reason: "payment window expired".to_string(),
                refund_status: RefundStatus::NotRequired,
            },
        );

        assert_eq!(event.sequence, 42);
        assert_eq!(event.command_id, command.command_id);
        assert_eq!(event.client_timestamp, Some(command.timestamp));
        assert_eq!(event.actor_id, "system");
    }
}
