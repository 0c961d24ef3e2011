//! Event appliers - fold events into order snapshots
//!
//! One applier per event type, dispatched through [`EventAction`]. Appliers
//! run both on the write path (right after a handler produces events) and
//! on replay, so they must stay deterministic: all data comes from the
//! event, never from the clock or from storage.

mod order_cancelled;
mod order_created;
mod order_delivered;
mod order_processing;
mod order_returned;
mod order_shipped;
mod payment_failed;
mod payment_initiated;
mod payment_settled;

pub use order_cancelled::OrderCancelledApplier;
pub use order_created::OrderCreatedApplier;
pub use order_delivered::OrderDeliveredApplier;
pub use order_processing::OrderProcessingApplier;
pub use order_returned::OrderReturnedApplier;
pub use order_shipped::OrderShippedApplier;
pub use payment_failed::PaymentFailedApplier;
pub use payment_initiated::PaymentInitiatedApplier;
pub use payment_settled::PaymentSettledApplier;

use enum_dispatch::enum_dispatch;

use shared::order::{
    OrderEvent, OrderEventType, OrderSnapshot, OrderStatus, StatusHistoryEntry,
};

use super::traits::EventApplier;

/// All event appliers, dispatched by event type
#[enum_dispatch(EventApplier)]
pub enum EventAction {
    OrderCreated(OrderCreatedApplier),
    OrderCancelled(OrderCancelledApplier),
    OrderReturned(OrderReturnedApplier),
    PaymentInitiated(PaymentInitiatedApplier),
    PaymentSettled(PaymentSettledApplier),
    PaymentFailed(PaymentFailedApplier),
    OrderProcessing(OrderProcessingApplier),
    OrderShipped(OrderShippedApplier),
    OrderDelivered(OrderDeliveredApplier),
}

impl From<&OrderEvent> for EventAction {
    fn from(event: &OrderEvent) -> Self {
        match event.event_type {
            OrderEventType::OrderCreated => EventAction::OrderCreated(OrderCreatedApplier),
            OrderEventType::OrderCancelled => EventAction::OrderCancelled(OrderCancelledApplier),
            OrderEventType::OrderReturned => EventAction::OrderReturned(OrderReturnedApplier),
            OrderEventType::PaymentInitiated => {
                EventAction::PaymentInitiated(PaymentInitiatedApplier)
            }
            OrderEventType::PaymentSettled => EventAction::PaymentSettled(PaymentSettledApplier),
            OrderEventType::PaymentFailed => EventAction::PaymentFailed(PaymentFailedApplier),
            OrderEventType::OrderProcessing => {
                EventAction::OrderProcessing(OrderProcessingApplier)
            }
            OrderEventType::OrderShipped => EventAction::OrderShipped(OrderShippedApplier),
            OrderEventType::OrderDelivered => EventAction::OrderDelivered(OrderDeliveredApplier),
        }
    }
}

/// Append a status-history entry for a transition driven by `event`
pub(super) fn push_history(
    snapshot: &mut OrderSnapshot,
    event: &OrderEvent,
    status: OrderStatus,
    comment: Option<String>,
) {
    snapshot.status_history.push(StatusHistoryEntry {
        status,
        actor_id: event.actor_id.clone(),
        actor_name: event.actor_name.clone(),
        comment,
        timestamp: event.timestamp,
    });
}

/// Stamp the bookkeeping fields every applier maintains
pub(super) fn finish_apply(snapshot: &mut OrderSnapshot, event: &OrderEvent) {
    snapshot.last_sequence = event.sequence;
    snapshot.updated_at = event.timestamp;
    snapshot.update_checksum();
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{
        Address, EventPayload, OrderLine, PaymentMethod, PaymentStatus, Pricing, ShipmentInfo,
    };

    fn event(sequence: u64, event_type: OrderEventType, payload: EventPayload) -> OrderEvent {
        OrderEvent::new(
            sequence,
            "ORD-20250825-1001".to_string(),
            "cust-1".to_string(),
            "Asha".to_string(),
            format!("cmd-{sequence}"),
            None,
            event_type,
            payload,
        )
    }

    fn created_payload(method: PaymentMethod, status: OrderStatus) -> EventPayload {
        EventPayload::OrderCreated {
            customer_id: "cust-1".to_string(),
            items: vec![OrderLine {
                product_id: "P1".to_string(),
                seller_id: "S1".to_string(),
                name: "Ceramic mug".to_string(),
                unit_price: 100.0,
                quantity: 2,
                line_total: 200.0,
                variant: None,
            }],
            shipping_address: Address::default(),
            billing_address: Address::default(),
            pricing: Pricing {
                subtotal: 200.0,
                shipping: 50.0,
                tax: 0.0,
                discount: 0.0,
                total: 250.0,
                currency: "INR".to_string(),
            },
            payment_method: method,
            status,
            note: None,
        }
    }

    fn apply(snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        let applier: EventAction = event.into();
        applier.apply(snapshot, event);
    }

    #[test]
    fn test_replay_full_online_lifecycle() {
        let events = vec![
            event(
                1,
                OrderEventType::OrderCreated,
                created_payload(PaymentMethod::Online, OrderStatus::Pending),
            ),
            event(
                2,
                OrderEventType::PaymentInitiated,
                EventPayload::PaymentInitiated {
                    gateway_order_ref: "gw_ord_abc".to_string(),
                },
            ),
            event(
                3,
                OrderEventType::PaymentSettled,
                EventPayload::PaymentSettled {
                    gateway_order_ref: "gw_ord_abc".to_string(),
                    gateway_payment_ref: "gw_pay_123".to_string(),
                    paid_at: 1_724_500_000_000,
                },
            ),
            event(4, OrderEventType::OrderProcessing, EventPayload::OrderProcessing {}),
            event(
                5,
                OrderEventType::OrderShipped,
                EventPayload::OrderShipped {
                    shipment: ShipmentInfo {
                        carrier: "BlueDart".to_string(),
                        tracking_number: "BD123456".to_string(),
                    },
                },
            ),
            event(6, OrderEventType::OrderDelivered, EventPayload::OrderDelivered {}),
        ];

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        for e in &events {
            apply(&mut snapshot, e);
        }

        assert_eq!(snapshot.status, OrderStatus::Delivered);
        assert_eq!(snapshot.payment.status, PaymentStatus::Completed);
        assert_eq!(
            snapshot.payment.gateway_payment_ref.as_deref(),
            Some("gw_pay_123")
        );
        assert_eq!(snapshot.last_sequence, 6);
        assert!(snapshot.verify_checksum());
        // created, confirmed, processing, shipped, delivered
        assert_eq!(snapshot.status_history.len(), 5);

        // replay on a fresh shell reproduces the exact same state
        let mut replayed = OrderSnapshot::new("ORD-20250825-1001".to_string());
        for e in &events {
            apply(&mut replayed, e);
        }
        assert_eq!(replayed, snapshot);
        assert_eq!(replayed.state_checksum, snapshot.state_checksum);
    }

    #[test]
    fn test_replay_cod_lifecycle_settles_on_delivery() {
        let events = vec![
            event(
                1,
                OrderEventType::OrderCreated,
                created_payload(PaymentMethod::CashOnDelivery, OrderStatus::Confirmed),
            ),
            event(2, OrderEventType::OrderProcessing, EventPayload::OrderProcessing {}),
            event(
                3,
                OrderEventType::OrderShipped,
                EventPayload::OrderShipped {
                    shipment: ShipmentInfo {
                        carrier: "Delhivery".to_string(),
                        tracking_number: "DL998877".to_string(),
                    },
                },
            ),
            event(4, OrderEventType::OrderDelivered, EventPayload::OrderDelivered {}),
        ];

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        for e in &events {
            apply(&mut snapshot, e);
        }

        assert_eq!(snapshot.status, OrderStatus::Delivered);
        assert_eq!(snapshot.payment.method, PaymentMethod::CashOnDelivery);
        assert_eq!(snapshot.payment.status, PaymentStatus::Completed);
        assert!(snapshot.payment.paid_at.is_some());
        // created (confirmed), processing, shipped, delivered
        assert_eq!(snapshot.status_history.len(), 4);
    }

    #[test]
    fn test_replay_cancellation() {
        let events = vec![
            event(
                1,
                OrderEventType::OrderCreated,
                created_payload(PaymentMethod::Online, OrderStatus::Pending),
            ),
            event(
                2,
                OrderEventType::OrderCancelled,
                EventPayload::OrderCancelled {
                    reason: "payment window expired".to_string(),
                    refund_status: shared::order::RefundStatus::NotRequired,
                },
            ),
        ];

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        for e in &events {
            apply(&mut snapshot, e);
        }

        assert_eq!(snapshot.status, OrderStatus::Cancelled);
        let cancellation = snapshot.cancellation.as_ref().unwrap();
        assert_eq!(cancellation.reason, "payment window expired");
        assert!(snapshot.verify_checksum());
    }
}
