//! Apply OrderCancelled

use shared::order::{CancellationRecord, EventPayload, OrderEvent, OrderSnapshot, OrderStatus};

use super::{finish_apply, push_history};
use crate::orders::traits::EventApplier;

pub struct OrderCancelledApplier;

impl EventApplier for OrderCancelledApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::OrderCancelled {
            reason,
            refund_status,
        } = &event.payload
        {
            snapshot.status = OrderStatus::Cancelled;
            snapshot.cancellation = Some(CancellationRecord {
                reason: reason.clone(),
                actor_id: event.actor_id.clone(),
                actor_name: event.actor_name.clone(),
                timestamp: event.timestamp,
                refund_status: *refund_status,
            });

            push_history(snapshot, event, OrderStatus::Cancelled, Some(reason.clone()));
        }
        finish_apply(snapshot, event);
    }
}
