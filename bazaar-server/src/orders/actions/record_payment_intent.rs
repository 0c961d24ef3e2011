//! Attach the gateway order reference to a pending order

use shared::order::{EventPayload, OrderEvent, OrderEventType, OrderStatus, PaymentMethod};

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Records the gateway-side order reference created for an online payment.
///
/// Re-recording the same reference is a no-op; a different reference is
/// accepted and replaces the stored one, covering re-initiation after a
/// gateway timeout where a fresh intent was created.
pub struct RecordPaymentIntentAction {
    pub order_id: String,
    pub gateway_order_ref: String,
}

impl CommandHandler for RecordPaymentIntentAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.gateway_order_ref.trim().is_empty() {
            return Err(OrderError::InvalidOperation(
                "gateway_order_ref must not be empty".to_string(),
            ));
        }

        let snapshot = ctx.load_snapshot(&self.order_id)?;

        if snapshot.payment.method != PaymentMethod::Online {
            return Err(OrderError::InvalidOperation(format!(
                "order {} is cash on delivery and takes no payment intent",
                self.order_id
            )));
        }
        if snapshot.payment.is_completed() {
            return Err(OrderError::PaymentAlreadySettled(self.order_id.clone()));
        }
        if snapshot.status != OrderStatus::Pending {
            return Err(OrderError::InvalidOperation(format!(
                "payment intent requires a pending order, order {} is {}",
                self.order_id, snapshot.status
            )));
        }
        if snapshot.payment.gateway_order_ref.as_deref() == Some(&self.gateway_order_ref) {
            return Ok(vec![]);
        }

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::PaymentInitiated,
            EventPayload::PaymentInitiated {
                gateway_order_ref: self.gateway_order_ref.clone(),
            },
        );

        Ok(vec![event])
    }
}
