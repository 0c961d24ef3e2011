//! Apply PaymentFailed

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, PaymentStatus};

use super::finish_apply;
use crate::orders::traits::EventApplier;

/// Records a failed settlement attempt. The order stays in its current
/// status; retries and eventual expiry are driven elsewhere.
pub struct PaymentFailedApplier;

impl EventApplier for PaymentFailedApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::PaymentFailed {
            gateway_order_ref,
            reason,
        } = &event.payload
        {
            snapshot.payment.status = PaymentStatus::Failed;
            snapshot.payment.failure_reason = Some(reason.clone());
            if snapshot.payment.gateway_order_ref.is_none() {
                snapshot.payment.gateway_order_ref = gateway_order_ref.clone();
            }
        }
        finish_apply(snapshot, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderEventType, OrderStatus};

    #[test]
    fn test_apply_payment_failed() {
        let event = OrderEvent::new(
            3,
            "ORD-20250825-1001".to_string(),
            "system".to_string(),
            "payment coordinator".to_string(),
            "cmd-3".to_string(),
            None,
            OrderEventType::PaymentFailed,
            EventPayload::PaymentFailed {
                gateway_order_ref: Some("gw_ord_abc".to_string()),
                reason: "card declined".to_string(),
            },
        );

        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        PaymentFailedApplier.apply(&mut snapshot, &event);

        assert_eq!(snapshot.status, OrderStatus::Pending);
        assert_eq!(snapshot.payment.status, PaymentStatus::Failed);
        assert_eq!(
            snapshot.payment.failure_reason.as_deref(),
            Some("card declined")
        );
        assert_eq!(
            snapshot.payment.gateway_order_ref.as_deref(),
            Some("gw_ord_abc")
        );
        assert!(snapshot.status_history.is_empty());
        assert!(snapshot.verify_checksum());
    }
}
