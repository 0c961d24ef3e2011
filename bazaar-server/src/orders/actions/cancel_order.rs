//! Cancel an order before shipment

use shared::order::{EventPayload, OrderEvent, OrderEventType, OrderStatus, RefundStatus};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Cancels an order that has not shipped yet.
///
/// Allowed from PENDING, CONFIRMED and PROCESSING. The refund outcome is
/// decided here: a captured payment gets a refund initiated, anything else
/// needs none. Once the parcel is with the carrier the customer must go
/// through delivery and return instead.
pub struct CancelOrderAction {
    pub order_id: String,
    pub reason: String,
}

impl CommandHandler for CancelOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.reason.trim().is_empty() {
            return Err(OrderError::InvalidOperation(
                "cancellation reason must not be empty".to_string(),
            ));
        }

        let snapshot = ctx.load_snapshot(&self.order_id)?;

        match snapshot.status {
            OrderStatus::Cancelled => {
                return Err(OrderError::AlreadyCancelled(self.order_id.clone()));
            }
            OrderStatus::Delivered => {
                return Err(OrderError::AlreadyDelivered(self.order_id.clone()));
            }
            OrderStatus::Returned => {
                return Err(OrderError::AlreadyReturned(self.order_id.clone()));
            }
            other => assert_transition(other, OrderStatus::Cancelled)?,
        }

        let refund_status = if snapshot.payment.is_completed() {
            RefundStatus::Initiated
        } else {
            RefundStatus::NotRequired
        };

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::OrderCancelled,
            EventPayload::OrderCancelled {
                reason: self.reason.clone(),
                refund_status,
            },
        );

        Ok(vec![event])
    }
}
