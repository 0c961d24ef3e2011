//! Settle a verified online payment

use shared::order::{EventPayload, OrderEvent, OrderEventType, OrderStatus};

use crate::orders::state_machine::assert_transition;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Marks an online payment as captured and confirms the order.
///
/// The signature on the gateway callback has already been verified by the
/// payment coordinator; this action enforces the order-side rules: there
/// must be a recorded intent, the gateway order reference must match it,
/// and the order must still admit confirmation. Replaying a settlement with
/// the same payment reference is acknowledged without a new event.
pub struct SettlePaymentAction {
    pub order_id: String,
    pub gateway_order_ref: String,
    pub gateway_payment_ref: String,
}

impl CommandHandler for SettlePaymentAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let snapshot = ctx.load_snapshot(&self.order_id)?;

        if snapshot.payment.is_completed() {
            if snapshot.payment.gateway_payment_ref.as_deref() == Some(&self.gateway_payment_ref) {
                return Ok(vec![]);
            }
            return Err(OrderError::PaymentAlreadySettled(self.order_id.clone()));
        }

        match snapshot.payment.gateway_order_ref.as_deref() {
            None => return Err(OrderError::PaymentNotInitiated(self.order_id.clone())),
            Some(stored) if stored != self.gateway_order_ref => {
                return Err(OrderError::PaymentRefMismatch(self.order_id.clone()));
            }
            Some(_) => {}
        }

        // A cancelled order cannot be confirmed; a late capture surfaces as
        // an invalid transition and the caller starts the refund path.
        assert_transition(snapshot.status, OrderStatus::Confirmed)?;

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::PaymentSettled,
            EventPayload::PaymentSettled {
                gateway_order_ref: self.gateway_order_ref.clone(),
                gateway_payment_ref: self.gateway_payment_ref.clone(),
                paid_at: chrono::Utc::now().timestamp_millis(),
            },
        );

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::storage::OrderStorage;
    use shared::order::{OrderSnapshot, PaymentMethod, PaymentRecord, PaymentStatus};

    fn test_metadata() -> CommandMetadata {
        CommandMetadata {
            command_id: "cmd-1".to_string(),
            actor_id: "system".to_string(),
            actor_name: "payment coordinator".to_string(),
            timestamp: 1_724_500_000_000,
        }
    }

    fn seed_order(storage: &OrderStorage, status: OrderStatus, payment: PaymentRecord) {
        let mut snapshot = OrderSnapshot::new("ORD-20250825-1001".to_string());
        snapshot.customer_id = "cust-1".to_string();
        snapshot.status = status;
        snapshot.payment = payment;
        snapshot.update_checksum();

        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &snapshot).unwrap();
        txn.commit().unwrap();
    }

    fn initiated_payment() -> PaymentRecord {
        let mut payment = PaymentRecord::new(PaymentMethod::Online);
        payment.gateway_order_ref = Some("gw_ord_abc".to_string());
        payment
    }

    fn action() -> SettlePaymentAction {
        SettlePaymentAction {
            order_id: "ORD-20250825-1001".to_string(),
            gateway_order_ref: "gw_ord_abc".to_string(),
            gateway_payment_ref: "gw_pay_123".to_string(),
        }
    }

    #[test]
    fn test_settles_pending_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(&storage, OrderStatus::Pending, initiated_payment());

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 2);

        let events = action().execute(&mut ctx, &test_metadata()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, OrderEventType::PaymentSettled);
        assert_eq!(events[0].sequence, 3);
        match &events[0].payload {
            EventPayload::PaymentSettled {
                gateway_payment_ref,
                paid_at,
                ..
            } => {
                assert_eq!(gateway_payment_ref, "gw_pay_123");
                assert!(*paid_at > 0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_replay_with_same_payment_ref_is_noop() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut payment = initiated_payment();
        payment.status = PaymentStatus::Completed;
        payment.gateway_payment_ref = Some("gw_pay_123".to_string());
        seed_order(&storage, OrderStatus::Confirmed, payment);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 3);

        let events = action().execute(&mut ctx, &test_metadata()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_second_settlement_with_different_ref_rejected() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut payment = initiated_payment();
        payment.status = PaymentStatus::Completed;
        payment.gateway_payment_ref = Some("gw_pay_other".to_string());
        seed_order(&storage, OrderStatus::Confirmed, payment);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 3);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::PaymentAlreadySettled("ORD-20250825-1001".to_string())
        );
    }

    #[test]
    fn test_mismatched_order_ref_rejected() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut payment = initiated_payment();
        payment.gateway_order_ref = Some("gw_ord_other".to_string());
        seed_order(&storage, OrderStatus::Pending, payment);

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 2);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::PaymentRefMismatch("ORD-20250825-1001".to_string())
        );
    }

    #[test]
    fn test_no_intent_rejected() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(
            &storage,
            OrderStatus::Pending,
            PaymentRecord::new(PaymentMethod::Online),
        );

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 2);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::PaymentNotInitiated("ORD-20250825-1001".to_string())
        );
    }

    #[test]
    fn test_late_capture_after_cancellation_rejected() {
        let storage = OrderStorage::open_in_memory().unwrap();
        seed_order(&storage, OrderStatus::Cancelled, initiated_payment());

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 2);

        let err = action().execute(&mut ctx, &test_metadata()).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Confirmed
            }
        );
    }
}
