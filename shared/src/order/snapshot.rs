//! Order snapshot - computed state from event stream
//!
//! The snapshot includes a `state_checksum` field for drift detection.
//! Consumers can compare their locally computed checksum with the server's
//! to detect if the reducer logic has diverged.

use super::types::{
    Address, CancellationRecord, OrderLine, PaymentMethod, PaymentRecord, Pricing, ShipmentInfo,
};
use serde::{Deserialize, Serialize};

/// Order status
///
/// The forward path is pending -> confirmed -> processing -> shipped ->
/// delivered, with cancellation allowed up to processing and returns only
/// after delivery. Delivered, cancelled and returned are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting payment confirmation
    #[default]
    Pending,
    /// Payment settled (or cash-on-delivery accepted)
    Confirmed,
    /// Seller is preparing the shipment
    Processing,
    /// Handed to the carrier
    Shipped,
    /// Delivered to the customer
    Delivered,
    /// Cancelled before shipment
    Cancelled,
    /// Returned after delivery
    Returned,
}

impl OrderStatus {
    /// Wire-format name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the order's status history
///
/// Every status transition appends exactly one entry; the first entry
/// records the status the order was created in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    /// Status after the transition
    pub status: OrderStatus,
    /// Actor who drove the transition
    pub actor_id: String,
    /// Actor name (snapshot for audit)
    pub actor_name: String,
    /// Optional comment (cancellation reason, tracking number, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Transition timestamp (Unix milliseconds)
    pub timestamp: i64,
}

/// Order snapshot - computed from event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSnapshot {
    /// Order ID (server-assigned, human-legible, e.g. ORD-20250825-1001)
    pub order_id: String,
    /// Customer who placed the order
    pub customer_id: String,
    /// Priced line items (catalog prices snapshotted at placement)
    pub items: Vec<OrderLine>,
    /// Shipping address
    pub shipping_address: Address,
    /// Billing address
    pub billing_address: Address,
    /// Pricing breakdown (computed once at placement)
    pub pricing: Pricing,
    /// Payment record
    pub payment: PaymentRecord,
    /// Order status
    pub status: OrderStatus,
    /// Status transition history
    pub status_history: Vec<StatusHistoryEntry>,
    /// Cancellation details (only when status is CANCELLED)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationRecord>,
    /// Shipment details (set when the order ships)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<ShipmentInfo>,
    /// Customer note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Creation timestamp
    pub created_at: i64,
    /// Last update timestamp
    pub updated_at: i64,
    /// Last applied event sequence (for incremental updates)
    pub last_sequence: u64,
    /// State checksum for drift detection (hex string)
    /// Computed from: order_id, status, items.len, total, payment status,
    /// last_sequence
    #[serde(default)]
    pub state_checksum: String,
}

impl OrderSnapshot {
    /// Create a new empty order shell
    ///
    /// The OrderCreated applier fills in the real content; the defaults here
    /// only exist so storage round-trips and reducers have a starting point.
    pub fn new(order_id: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut snapshot = Self {
            order_id,
            customer_id: String::new(),
            items: Vec::new(),
            shipping_address: Address::default(),
            billing_address: Address::default(),
            pricing: Pricing::default(),
            payment: PaymentRecord::new(PaymentMethod::Online),
            status: OrderStatus::Pending,
            status_history: Vec::new(),
            cancellation: None,
            shipment: None,
            note: None,
            created_at: now,
            updated_at: now,
            last_sequence: 0,
            state_checksum: String::new(),
        };
        snapshot.update_checksum();
        snapshot
    }

    /// Check if order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the order can still be cancelled
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Total quantity across all line items
    pub fn total_quantity(&self) -> i32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Compute state checksum for drift detection
    ///
    /// The checksum is computed from key state fields that should match
    /// between writer and reader after applying the same events.
    /// Returns a 16-character hex string (first 8 bytes of a SHA-256).
    pub fn compute_checksum(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.order_id.as_bytes());
        hasher.update([self.status as u8]);
        hasher.update((self.items.len() as u64).to_le_bytes());
        // Totals in cents to avoid float precision issues
        hasher.update(((self.pricing.total * 100.0).round() as i64).to_le_bytes());
        hasher.update([self.payment.status as u8]);
        hasher.update(self.last_sequence.to_le_bytes());

        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    /// Update the state_checksum field based on current state
    pub fn update_checksum(&mut self) {
        self.state_checksum = self.compute_checksum();
    }

    /// Verify that the state_checksum matches computed checksum
    /// Returns true if checksum matches, false if drift detected
    pub fn verify_checksum(&self) -> bool {
        self.state_checksum == self.compute_checksum()
    }
}

impl Default for OrderSnapshot {
    fn default() -> Self {
        Self::new(String::new())
    }
}
