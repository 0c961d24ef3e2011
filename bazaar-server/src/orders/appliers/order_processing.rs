//! Apply OrderProcessing

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, OrderStatus};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

pub struct OrderProcessingApplier;

impl EventApplier for OrderProcessingApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderProcessing {} = &event.payload {
            snapshot.status = OrderStatus::Processing;
            push_history(snapshot, event, OrderStatus::Processing, None);
        }
        finish_apply(snapshot, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::OrderEventType;

    #[test]
    fn test_apply_order_processing() {
        let event = OrderEvent::new(
            4,
            "ORD-20250825-1001".to_string(),
            "seller-1".to_string(),
            "Mehta Stores".to_string(),
            "cmd-4".to_string(),
            None,
            OrderEventType::OrderProcessing,
            EventPayload::OrderProcessing {},
        );

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        snapshot.status = OrderStatus::Confirmed;
        OrderProcessingApplier.apply(&mut snapshot, &event);

        assert_eq!(snapshot.status, OrderStatus::Processing);
        assert_eq!(snapshot.status_history.len(), 1);
        assert_eq!(snapshot.status_history[0].actor_id, "seller-1");
    }
}
