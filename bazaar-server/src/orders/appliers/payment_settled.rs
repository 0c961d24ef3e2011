//! Apply PaymentSettled

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, OrderStatus, PaymentStatus};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

/// Marks the payment captured and confirms the order.
pub struct PaymentSettledApplier;

impl EventApplier for PaymentSettledApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::PaymentSettled {
            gateway_order_ref,
            gateway_payment_ref,
            paid_at,
        } = &event.payload
        {
            snapshot.payment.status = PaymentStatus::Completed;
            snapshot.payment.gateway_order_ref = Some(gateway_order_ref.clone());
            snapshot.payment.gateway_payment_ref = Some(gateway_payment_ref.clone());
            snapshot.payment.paid_at = Some(*paid_at);
            snapshot.payment.failure_reason = None;
            snapshot.status = OrderStatus::Confirmed;

            push_history(snapshot, event, OrderStatus::Confirmed, None);
        }
        finish_apply(snapshot, event);
    }
}
