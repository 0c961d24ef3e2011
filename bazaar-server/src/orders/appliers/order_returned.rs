//! Apply OrderReturned

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, OrderStatus};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

pub struct OrderReturnedApplier;

impl EventApplier for OrderReturnedApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderReturned { reason } = &event.payload {
            snapshot.status = OrderStatus::Returned;
            push_history(snapshot, event, OrderStatus::Returned, reason.clone());
        }
        finish_apply(snapshot, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::OrderEventType;

    #[test]
    fn test_apply_order_returned() {
        let event = OrderEvent::new(
            7,
            "ORD-20250825-1001".to_string(),
            "cust-1".to_string(),
            "Asha".to_string(),
            "cmd-7".to_string(),
            None,
            OrderEventType::OrderReturned,
            EventPayload::OrderReturned {
                reason: Some("damaged in transit".to_string()),
            },
        );

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        snapshot.status = OrderStatus::Delivered;
        OrderReturnedApplier.apply(&mut snapshot, &event);

        assert_eq!(snapshot.status, OrderStatus::Returned);
        assert_eq!(
            snapshot.status_history[0].comment.as_deref(),
            Some("damaged in transit")
        );
        assert_eq!(snapshot.last_sequence, 7);
        assert!(snapshot.verify_checksum());
    }
}
