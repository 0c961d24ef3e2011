//! Apply OrderShipped

use shared::order::{EventPayload, OrderEvent, OrderSnapshot, OrderStatus};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

pub struct OrderShippedApplier;

impl EventApplier for OrderShippedApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderShipped { shipment } = &event.payload {
            snapshot.status = OrderStatus::Shipped;
            snapshot.shipment = Some(shipment.clone());

            let comment = format!("{} {}", shipment.carrier, shipment.tracking_number);
            push_history(snapshot, event, OrderStatus::Shipped, Some(comment));
        }
        finish_apply(snapshot, event);
    }
}
