//! Apply OrderCreated

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, PaymentRecord};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

/// Fills a fresh snapshot shell with the order's content.
///
/// Writes the first status-history entry too: the status the order was
/// created in (PENDING, or CONFIRMED for cash on delivery).
pub struct OrderCreatedApplier;

impl EventApplier for OrderCreatedApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderCreated {
            customer_id,
            items,
            shipping_address,
            billing_address,
            pricing,
            payment_method,
            status,
            note,
        } = &event.payload
        {
            snapshot.customer_id = customer_id.clone();
            snapshot.items = items.clone();
            snapshot.shipping_address = shipping_address.clone();
            snapshot.billing_address = billing_address.clone();
            snapshot.pricing = pricing.clone();
            snapshot.payment = PaymentRecord::new(*payment_method);
            snapshot.status = *status;
            snapshot.note = note.clone();
            snapshot.created_at = event.timestamp;

            push_history(snapshot, event, *status, None);
        }
        finish_apply(snapshot, event);
    }
}
