//! Advance fulfilment status

use shared::order::{EventPayload, OrderEvent, OrderEventType, OrderStatus, ShipmentInfo};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Moves an order along the fulfilment path.
///
/// Only PROCESSING, SHIPPED and DELIVERED can be set this way; CONFIRMED
/// comes from settlement, CANCELLED and RETURNED have their own commands.
/// Marking an order shipped requires carrier details.
pub struct UpdateStatusAction {
    pub order_id: String,
    pub status: OrderStatus,
    pub shipment: Option<ShipmentInfo>,
}

impl CommandHandler for UpdateStatusAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let snapshot = ctx.load_snapshot(&self.order_id)?;

        let (event_type, payload) = match self.status {
            OrderStatus::Processing => (
                OrderEventType::OrderProcessing,
                EventPayload::OrderProcessing {},
            ),
            OrderStatus::Shipped => {
                let shipment = self.shipment.clone().ok_or_else(|| {
                    OrderError::InvalidOperation(
                        "shipment details required when marking an order shipped".to_string(),
                    )
                })?;
                (
                    OrderEventType::OrderShipped,
                    EventPayload::OrderShipped { shipment },
                )
            }
            OrderStatus::Delivered => (
                OrderEventType::OrderDelivered,
                EventPayload::OrderDelivered {},
            ),
            other => {
                return Err(OrderError::InvalidOperation(format!(
                    "status {} cannot be set directly",
                    other
                )));
            }
        };

        assert_transition(snapshot.status, self.status)?;

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            event_type,
            payload,
        );

        Ok(vec![event])
    }
}
