//! Apply PaymentInitiated

use shared::order::{EventPayload, OrderEvent, OrderSnapshot};

use super::finish_apply;
use crate::orders::traits::EventApplier;

/// Records the gateway order reference. Status does not change.
pub struct PaymentInitiatedApplier;

impl EventApplier for PaymentInitiatedApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent) {
        if let EventPayload::PaymentInitiated { gateway_order_ref } = &event.payload {
            snapshot.payment.gateway_order_ref = Some(gateway_order_ref.clone());
        }
        finish_apply(snapshot, event);
    }
}
