//! Register a post-delivery return

use shared::order::{EventPayload, OrderEvent, OrderEventType, OrderStatus};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Moves a delivered order to RETURNED.
///
/// Only delivered orders can be returned; the physical return logistics and
/// the refund itself are handled outside this system.
pub struct ReturnOrderAction {
    pub order_id: String,
    pub reason: Option<String>,
}

impl CommandHandler for ReturnOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let snapshot = ctx.load_snapshot(&self.order_id)?;

        match snapshot.status {
            OrderStatus::Returned => {
                return Err(OrderError::AlreadyReturned(self.order_id.clone()));
            }
            OrderStatus::Cancelled => {
                return Err(OrderError::AlreadyCancelled(self.order_id.clone()));
            }
            other => assert_transition(other, OrderStatus::Returned)?,
        }

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::OrderReturned,
            EventPayload::OrderReturned {
                reason: self.reason.clone(),
            },
        );

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::storage::OrderStorage;
    use shared::order::OrderSnapshot;

    fn test_metadata() -> CommandMetadata {
        CommandMetadata {
            command_id: "cmd-1".to_string(),
            actor_id: "cust-1".to_string(),
            actor_name: "Asha".to_string(),
            timestamp: 1_724_500_000_000,
        }
    }

    fn seed_order(storage: &OrderStorage, status: OrderStatus) {
        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        snapshot.status = status;
        snapshot.update_checksum();

        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();
    }

    fn action() -> ReturnOrderAction {
        ReturnOrderAction {
            order_id: "ORD-20250825-1001".to_string(),
            reason: Some("damaged in transit".to_string()),
        }
    }

    #[test]
    fn test_return_delivered_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(&storage, OrderStatus::Delivered);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 5);

        let events = action().execute(&mut ctx, &test_metadata()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, OrderEventType::OrderReturned);
        match &events[0].payload {
            EventPayload::OrderReturned { reason } => {
                assert_eq!(reason.as_deref(), Some("damaged in transit"))
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_undelivered_order_cannot_be_returned() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(&storage, OrderStatus::Shipped);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 5);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Returned
            }
        );
    }

    #[test]
    fn test_double_return_rejected() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(&storage, OrderStatus::Returned);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 5);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::AlreadyReturned("ORD-20250825-1001".to_string())
        );
    }
}
