//! Shared types for the order event sourcing model

use serde::{Deserialize, Serialize};

// ============================================================================
// Payment Types
// ============================================================================

/// Payment method selected at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Paid through the payment gateway before fulfilment
    Online,
    /// Paid in cash when the parcel is handed over
    CashOnDelivery,
}

/// Payment lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting settlement
    #[default]
    Pending,
    /// Settled (captured by the gateway, or collected on delivery)
    Completed,
    /// Last settlement attempt failed
    Failed,
}

/// Payment record attached to an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    /// Payment method
    pub method: PaymentMethod,
    /// Payment status
    pub status: PaymentStatus,
    /// Gateway-side order reference (set when the payment intent is created)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_ref: Option<String>,
    /// Gateway-side payment reference (set on settlement)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_payment_ref: Option<String>,
    /// Settlement timestamp (Unix milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    /// Reason reported for the last failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PaymentRecord {
    /// Create a fresh pending record for the given method
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            gateway_order_ref: None,
            gateway_payment_ref: None,
            paid_at: None,
            failure_reason: None,
        }
    }

    /// Check if the payment has been settled
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Refund outcome recorded on cancellation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    /// No money was captured, nothing to refund
    #[default]
    NotRequired,
    /// Captured payment, refund handed to the gateway
    Initiated,
}

// ============================================================================
// Line Items
// ============================================================================

/// Order line - a priced item position on the order
///
/// Prices are snapshotted from the catalog at order placement and never
/// change afterwards, even if the catalog price moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    /// Product ID
    pub product_id: String,
    /// Seller owning the product (snapshot for settlement)
    pub seller_id: String,
    /// Product name (snapshot for display and audit)
    pub name: String,
    /// Unit price at placement time
    pub unit_price: f64,
    /// Quantity ordered
    pub quantity: i32,
    /// Line total (unit_price * quantity, rounded to cents)
    pub line_total: f64,
    /// Selected variant, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Order line input - client request before re-pricing
///
/// Deliberately carries no price fields; unit prices are always resolved
/// server-side from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineInput {
    /// Product ID
    pub product_id: String,
    /// Quantity requested
    pub quantity: i32,
    /// Selected variant, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

// ============================================================================
// Addresses and Shipment
// ============================================================================

/// Postal address for shipping or billing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    /// Recipient name
    pub name: String,
    /// Contact phone
    pub phone: String,
    /// Address line 1
    pub line1: String,
    /// Address line 2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// State or province
    pub state: String,
    /// Postal code
    pub postal_code: String,
    /// Country code
    pub country: String,
}

/// Shipment details recorded when the order is marked shipped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentInfo {
    /// Carrier name
    pub carrier: String,
    /// Carrier tracking number
    pub tracking_number: String,
}

// ============================================================================
// Pricing
// ============================================================================

/// Order pricing breakdown
///
/// Computed exactly once at order placement. The identity
/// `total = subtotal + shipping + tax - discount` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Pricing {
    /// Sum of line totals
    pub subtotal: f64,
    /// Shipping fee (zero at or above the free-shipping threshold)
    pub shipping: f64,
    /// Tax amount
    #[serde(default)]
    pub tax: f64,
    /// Discount amount
    #[serde(default)]
    pub discount: f64,
    /// Grand total
    pub total: f64,
    /// ISO currency code
    pub currency: String,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cancellation details recorded when an order is cancelled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRecord {
    /// Reason given for the cancellation
    pub reason: String,
    /// Who cancelled (customer, seller, or system)
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    /// Cancellation timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Refund outcome
    pub refund_status: RefundStatus,
}

// ============================================================================
// Command Responses
// ============================================================================

/// Response returned after processing a command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// The command ID this responds to
    pub command_id: String,
    /// Whether the command succeeded
    pub success: bool,
    /// Order ID touched by the command (assigned for PlaceOrder)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Error details if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn success(command_id: String, order_id: Option<String>) -> Self {
        Self {
            command_id,
            success: true,
            order_id,
            error: None,
        }
    }

    pub fn error(command_id: String, error: CommandError) -> Self {
        Self {
            command_id,
            success: false,
            order_id: None,
            error: Some(error),
        }
    }

    pub fn duplicate(command_id: String) -> Self {
        Self {
            command_id,
            success: true,
            order_id: None,
            error: None,
        }
    }
}

/// Command error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
    pub code: CommandErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: CommandErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Command error codes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandErrorCode {
    OrderNotFound,
    OrderEmpty,
    OrderAlreadyCancelled,
    OrderAlreadyDelivered,
    OrderAlreadyReturned,
    InvalidTransition,
    PaymentAlreadySettled,
    PaymentRefMismatch,
    PaymentNotInitiated,
    InvalidAmount,
    InvalidOperation,
    DuplicateCommand,
    InternalError,
    // Storage errors (maps to ErrorCode 94xx)
    StorageFull,
    OutOfMemory,
    StorageCorrupted,
    SystemBusy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_record_new() {
        let record = PaymentRecord::new(PaymentMethod::Online);
        assert_eq!(record.status, PaymentStatus::Pending);
        assert!(record.gateway_order_ref.is_none());
        assert!(record.paid_at.is_none());
        assert!(!record.is_completed());
    }

    #[test]
    fn test_order_line_serialization() {
        let line = OrderLine {
            product_id: "P1".to_string(),
            seller_id: "S1".to_string(),
            name: "Steel water bottle".to_string(),
            unit_price: 500.0,
            quantity: 2,
            line_total: 1000.0,
            variant: None,
        };

        let json = serde_json::to_string(&line).unwrap();
        // Absent variant must not appear on the wire
        assert!(!json.contains("variant"));

        let parsed: OrderLine = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, line);
    }

    #[test]
    fn test_order_line_input_has_no_price() {
        let json = r#"{"product_id":"P1","quantity":2,"unit_price":0.01}"#;
        // Unknown fields are ignored; price cannot be injected by clients
        let input: OrderLineInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.product_id, "P1");
        assert_eq!(input.quantity, 2);
    }

    #[test]
    fn test_command_response_ctors() {
        let ok = CommandResponse::success("c1".to_string(), Some("ORD-1".to_string()));
        assert!(ok.success);
        assert_eq!(ok.order_id.as_deref(), Some("ORD-1"));

        let dup = CommandResponse::duplicate("c1".to_string());
        assert!(dup.success);
        assert!(dup.error.is_none());

        let err = CommandResponse::error(
            "c1".to_string(),
            CommandError::new(CommandErrorCode::OrderNotFound, "order ORD-9 not found"),
        );
        assert!(!err.success);
        assert_eq!(
            err.error.unwrap().code,
            CommandErrorCode::OrderNotFound
        );
    }

    #[test]
    fn test_command_error_code_wire_format() {
        let json = serde_json::to_string(&CommandErrorCode::InvalidTransition).unwrap();
        assert_eq!(json, "\"INVALID_TRANSITION\"");

        let json = serde_json::to_string(&CommandErrorCode::PaymentAlreadySettled).unwrap();
        assert_eq!(json, "\"PAYMENT_ALREADY_SETTLED\"");
    }
}
