//! Command actions - one handler per command type
//!
//! Each action validates business rules against the current snapshot and
//! returns the events to record. [`CommandAction`] is the dispatch point the
//! manager drives; it is built from the command payload, except PlaceOrder
//! which the manager constructs directly to inject the generated order id.

mod cancel_order;
mod place_order;
mod record_payment_failure;
mod record_payment_intent;
mod return_order;
mod settle_payment;
mod update_status;

pub use cancel_order::CancelOrderAction;
pub use place_order::PlaceOrderAction;
pub use record_payment_failure::RecordPaymentFailureAction;
pub use record_payment_intent::RecordPaymentIntentAction;
pub use return_order::ReturnOrderAction;
pub use settle_payment::SettlePaymentAction;
pub use update_status::UpdateStatusAction;

use shared::order::{OrderCommand, OrderCommandPayload, OrderEvent};

use super::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// All command actions, dispatched by command type
pub enum CommandAction {
    PlaceOrder(PlaceOrderAction),
    RecordPaymentIntent(RecordPaymentIntentAction),
    SettlePayment(SettlePaymentAction),
    RecordPaymentFailure(RecordPaymentFailureAction),
    UpdateStatus(UpdateStatusAction),
    CancelOrder(CancelOrderAction),
    ReturnOrder(ReturnOrderAction),
}

impl CommandHandler for CommandAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self {
            CommandAction::PlaceOrder(action) => action.execute(ctx, metadata),
            CommandAction::RecordPaymentIntent(action) => action.execute(ctx, metadata),
            CommandAction::SettlePayment(action) => action.execute(ctx, metadata),
            CommandAction::RecordPaymentFailure(action) => action.execute(ctx, metadata),
            CommandAction::UpdateStatus(action) => action.execute(ctx, metadata),
            CommandAction::CancelOrder(action) => action.execute(ctx, metadata),
            CommandAction::ReturnOrder(action) => action.execute(ctx, metadata),
        }
    }
}

impl From<&OrderCommand> for CommandAction {
    fn from(command: &OrderCommand) -> Self {
        match &command.payload {
            // PlaceOrder needs the server-generated order id, which only the
            // manager has; it builds PlaceOrderAction itself.
            OrderCommandPayload::PlaceOrder { .. } => {
                unreachable!("PlaceOrder actions are constructed by the manager")
            }

            OrderCommandPayload::RecordPaymentIntent {
                order_id,
                gateway_order_ref,
            } => CommandAction::RecordPaymentIntent(RecordPaymentIntentAction {
                order_id: order_id.clone(),
                gateway_order_ref: gateway_order_ref.clone(),
            }),

            OrderCommandPayload::SettlePayment {
                order_id,
                gateway_order_ref,
                gateway_payment_ref,
            } => CommandAction::SettlePayment(SettlePaymentAction {
                order_id: order_id.clone(),
                gateway_order_ref: gateway_order_ref.clone(),
                gateway_payment_ref: gateway_payment_ref.clone(),
            }),

            OrderCommandPayload::RecordPaymentFailure {
                order_id,
                gateway_order_ref,
                reason,
            } => CommandAction::RecordPaymentFailure(RecordPaymentFailureAction {
                order_id: order_id.clone(),
                gateway_order_ref: gateway_order_ref.clone(),
                reason: reason.clone(),
            }),

            OrderCommandPayload::UpdateStatus {
                order_id,
                status,
                shipment,
            } => CommandAction::UpdateStatus(UpdateStatusAction {
                order_id: order_id.clone(),
                status: *status,
                shipment: shipment.clone(),
            }),

            OrderCommandPayload::CancelOrder { order_id, reason } => {
                CommandAction::CancelOrder(CancelOrderAction {
                    order_id: order_id.clone(),
                    reason: reason.clone(),
                })
            }

            OrderCommandPayload::ReturnOrder { order_id, reason } => {
                CommandAction::ReturnOrder(ReturnOrderAction {
                    order_id: order_id.clone(),
                    reason: reason.clone(),
                })
            }
        }
    }
}
