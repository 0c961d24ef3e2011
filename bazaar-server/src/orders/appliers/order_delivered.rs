//! Apply OrderDelivered

use shared::order::{
    EventPayload, OrderEvent, OrderSnapshot, OrderStatus, PaymentMethod, PaymentStatus,
};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

/// Marks the order delivered. For cash on delivery this is also the moment
/// the payment completes: the courier collected on handover.
pub struct OrderDeliveredApplier;

impl EventApplier for OrderDeliveredApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderDelivered {} = &event.payload {
            snapshot.status = OrderStatus::Delivered;

            if snapshot.payment.method == PaymentMethod::CashOnDelivery
                && !snapshot.payment.is_completed()
            {
                snapshot.payment.status = PaymentStatus::Completed;
                snapshot.payment.paid_at = Some(event.timestamp);
            }

            push_history(snapshot, event, OrderStatus::Delivered, None);
        }
        finish_apply(snapshot, event);
    }
}
