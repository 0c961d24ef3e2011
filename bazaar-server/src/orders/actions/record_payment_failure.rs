//! Record a failed or rejected settlement attempt

use shared::order::{EventPayload, OrderEvent, OrderEventType};

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Records a failed payment attempt against the order's audit trail.
///
/// The order stays PENDING; the customer may retry, and the expiry sweeper
/// cancels the order once the payment window (or the post-failure grace
/// period) runs out. Failures reported against an already-closed order are
/// acknowledged without an event.
pub struct RecordPaymentFailureAction {
    pub order_id: String,
    pub gateway_order_ref: Option<String>,
    pub reason: String,
}

impl CommandHandler for RecordPaymentFailureAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let snapshot = ctx.load_snapshot(&self.order_id)?;

        if snapshot.payment.is_completed() {
            return Err(OrderError::PaymentAlreadySettled(self.order_id.clone()));
        }
        if snapshot.is_terminal() {
            return Ok(vec![]);
        }

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::PaymentFailed,
            EventPayload::PaymentFailed {
                gateway_order_ref: self.gateway_order_ref.clone(),
                reason: self.reason.clone(),
            },
        );

        Ok(vec![event])
    }
}
