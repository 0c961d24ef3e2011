//! Notification dispatcher
//!
//! Consumes the post-commit event broadcast and turns customer-facing
//! lifecycle events into notification messages. Messages go to the relay
//! endpoint when one is configured, otherwise they are logged. Delivery
//! failures retry with backoff; a message that exhausts its retries is
//! dead-lettered for manual replay.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared::order::{EventPayload, OrderEvent, OrderSnapshot};
use shared::util::now_millis;

use crate::core::Config;

use super::manager::OrdersManager;
use super::storage::NotifyDeadLetter;

/// Base delay between delivery attempts; doubles each retry.
const RETRY_BACKOFF_MS: u64 = 500;

/// A customer-facing notification derived from one order event.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub notification_id: String,
    pub order_id: String,
    pub customer_id: String,
    pub event_type: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
}

/// Build the notification for an event, if it is one customers hear
/// about. Internal plumbing events return `None`.
pub fn build_notification(
    event: &OrderEvent,
    snapshot: &OrderSnapshot,
) -> Option<NotificationMessage> {
    let (title, body) = match &event.payload {
        EventPayload::OrderCreated { .. } => (
            "Order placed".to_string(),
            format!("Your order {} has been placed.", event.order_id),
        ),
        EventPayload::PaymentSettled { .. } => (
            "Payment received".to_string(),
            format!("Payment for order {} was received.", event.order_id),
        ),
        EventPayload::PaymentFailed { reason, .. } => (
            "Payment failed".to_string(),
            format!(
                "Payment for order {} failed: {}. You can retry from your orders page.",
                event.order_id, reason
            ),
        ),
        EventPayload::OrderShipped { shipment } => (
            "Order shipped".to_string(),
            format!(
                "Order {} is on its way with {} ({}).",
                event.order_id, shipment.carrier, shipment.tracking_number
            ),
        ),
        EventPayload::OrderDelivered {} => (
            "Order delivered".to_string(),
            format!("Order {} was delivered.", event.order_id),
        ),
        EventPayload::OrderCancelled { reason, .. } => (
            "Order cancelled".to_string(),
            format!("Order {} was cancelled: {}.", event.order_id, reason),
        ),
        EventPayload::OrderReturned { .. } => (
            "Return recorded".to_string(),
            format!("The return for order {} was recorded.", event.order_id),
        ),
        // intent bookkeeping and fulfilment-internal steps
        EventPayload::PaymentInitiated { .. } | EventPayload::OrderProcessing {} => return None,
    };

    Some(NotificationMessage {
        notification_id: Uuid::new_v4().to_string(),
        order_id: event.order_id.clone(),
        customer_id: snapshot.customer_id.clone(),
        event_type: event.event_type.to_string(),
        title,
        body,
        created_at: event.timestamp,
    })
}

pub struct NotificationDispatcher {
    manager: Arc<OrdersManager>,
    client: reqwest::Client,
    relay_url: Option<String>,
    max_retries: u32,
}

impl NotificationDispatcher {
    pub fn new(manager: Arc<OrdersManager>, config: &Config) -> Self {
        Self {
            manager,
            client: reqwest::Client::new(),
            relay_url: config.notify_relay_url.clone(),
            max_retries: config.notify_max_retries,
        }
    }

    /// Consume the event broadcast until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut rx = self.manager.subscribe();
        info!(relay = ?self.relay_url, "Notification dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = rx.recv() => match result {
                    Ok(event) => self.handle_event(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification dispatcher lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("Notification dispatcher stopped");
    }

    async fn handle_event(&self, event: &OrderEvent) {
        let snapshot = match self.manager.get_snapshot(&event.order_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(
                    order_id = %event.order_id,
                    "Event without a snapshot, skipping notification"
                );
                return;
            }
            Err(err) => {
                error!(
                    order_id = %event.order_id,
                    error = %err,
                    "Snapshot lookup failed, skipping notification"
                );
                return;
            }
        };

        let Some(message) = build_notification(event, &snapshot) else {
            return;
        };
        self.deliver_with_retry(message).await;
    }

    async fn deliver_with_retry(&self, message: NotificationMessage) {
        let mut attempt = 0;
        loop {
            match self.deliver(&message).await {
                Ok(()) => {
                    debug!(
                        notification_id = %message.notification_id,
                        order_id = %message.order_id,
                        "Notification delivered"
                    );
                    return;
                }
                Err(reason) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        self.dead_letter(&message, attempt, &reason);
                        return;
                    }
                    let backoff = RETRY_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(
                        notification_id = %message.notification_id,
                        attempt,
                        backoff_ms = backoff,
                        reason = %reason,
                        "Notification delivery failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), String> {
        let Some(url) = &self.relay_url else {
            info!(
                order_id = %message.order_id,
                customer_id = %message.customer_id,
                title = %message.title,
                "Notification (log only)"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        if !response.status().is_success() {
            return Err(format!("relay returned {}", response.status()));
        }
        Ok(())
    }

    fn dead_letter(&self, message: &NotificationMessage, retry_count: u32, last_error: &str) {
        error!(
            notification_id = %message.notification_id,
            order_id = %message.order_id,
            retries = retry_count,
            error = %last_error,
            "Notification dead-lettered"
        );
        let entry = NotifyDeadLetter {
            notification_id: message.notification_id.clone(),
            order_id: message.order_id.clone(),
            event_type: message.event_type.clone(),
            created_at: message.created_at,
            failed_at: now_millis(),
            retry_count,
            last_error: last_error.to_string(),
            message: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
        };
        if let Err(err) = self.manager.storage().store_dead_letter(&entry) {
            error!(error = %err, "Failed to persist dead letter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::storage::OrderStorage;
    use shared::order::{
        Address, OrderCommand, OrderCommandPayload, OrderEventType, OrderLine, PaymentMethod,
        Pricing, ShipmentInfo,
    };

    fn snapshot_for(order_id: &str) -> OrderSnapshot {
        let mut snapshot = OrderSnapshot::new(order_id.to_string());
        snapshot.customer_id = "cust-9".to_string();
        snapshot
    }

    fn event_for(order_id: &str, event_type: OrderEventType, payload: EventPayload) -> OrderEvent {
        OrderEvent::new(
            1,
            order_id.to_string(),
            "system".to_string(),
            "test".to_string(),
            Uuid::new_v4().to_string(),
            None,
            event_type,
            payload,
        )
    }

    #[test]
    fn test_shipped_event_builds_message() {
        let event = event_for(
            "ORD-1",
            OrderEventType::OrderShipped,
            EventPayload::OrderShipped {
                shipment: ShipmentInfo {
                    carrier: "BlueDart".to_string(),
                    tracking_number: "BD42".to_string(),
                },
            },
        );

        let message = build_notification(&event, &snapshot_for("ORD-1")).unwrap();
        assert_eq!(message.title, "Order shipped");
        assert!(message.body.contains("BlueDart"));
        assert!(message.body.contains("BD42"));
        assert_eq!(message.customer_id, "cust-9");
        assert_eq!(message.event_type, "ORDER_SHIPPED");
        assert_eq!(message.created_at, event.timestamp);
    }

    #[test]
    fn test_payment_failed_message_carries_reason() {
        let event = event_for(
            "ORD-2",
            OrderEventType::PaymentFailed,
            EventPayload::PaymentFailed {
                gateway_order_ref: Some("gw_1".to_string()),
                reason: "insufficient funds".to_string(),
            },
        );

        let message = build_notification(&event, &snapshot_for("ORD-2")).unwrap();
        assert_eq!(message.title, "Payment failed");
        assert!(message.body.contains("insufficient funds"));
    }

    #[test]
    fn test_internal_events_are_skipped() {
        let intent = event_for(
            "ORD-3",
            OrderEventType::PaymentInitiated,
            EventPayload::PaymentInitiated {
                gateway_order_ref: "gw_3".to_string(),
            },
        );
        assert!(build_notification(&intent, &snapshot_for("ORD-3")).is_none());

        let processing = event_for(
            "ORD-3",
            OrderEventType::OrderProcessing,
            EventPayload::OrderProcessing {},
        );
        assert!(build_notification(&processing, &snapshot_for("ORD-3")).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_relay_dead_letters() {
        let manager = Arc::new(OrdersManager::with_storage(
            OrderStorage::open_in_memory().unwrap(),
        ));

        let mut config = Config::with_overrides(Some("unused".to_string()), Some(0));
        // nothing listens on port 1; connections fail immediately
        config.notify_relay_url = Some("http://127.0.0.1:1/notify".to_string());
        config.notify_max_retries = 2;
        let dispatcher = NotificationDispatcher::new(manager.clone(), &config);

        let mut rx = manager.subscribe();
        let response = manager.execute_command(OrderCommand::new(
            "cust-1",
            "customer",
            OrderCommandPayload::PlaceOrder {
                customer_id: "cust-1".to_string(),
                items: vec![OrderLine {
                    product_id: "P1".to_string(),
                    seller_id: "S1".to_string(),
                    name: "Ceramic Mug".to_string(),
                    unit_price: 100.0,
                    quantity: 1,
                    line_total: 100.0,
                    variant: None,
                }],
                shipping_address: Address::default(),
                billing_address: Address::default(),
                payment_method: PaymentMethod::CashOnDelivery,
                pricing: Pricing {
                    subtotal: 100.0,
                    shipping: 50.0,
                    tax: 0.0,
                    discount: 0.0,
                    total: 150.0,
                    currency: "INR".to_string(),
                },
                note: None,
            },
        ));
        assert!(response.success);

        let event = rx.try_recv().unwrap();
        dispatcher.handle_event(&event).await;

        let letters = manager.storage().get_dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].retry_count, 2);
        assert_eq!(letters[0].event_type, "ORDER_CREATED");
        assert_eq!(letters[0].order_id, event.order_id);
    }
}
