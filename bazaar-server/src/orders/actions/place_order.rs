//! Place a new order

use shared::order::{
    Address, EventPayload, OrderEvent, OrderEventType, OrderLine, OrderStatus, PaymentMethod,
    Pricing,
};

use crate::orders::pricing::validate_pricing;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};

/// Creates the order in its initial status.
///
/// Items arrive already re-priced from the catalog and the pricing block
/// already computed; this action re-checks the arithmetic and decides the
/// initial status: CONFIRMED for cash on delivery, PENDING for online
/// payment (confirmation comes later from settlement).
pub struct PlaceOrderAction {
    /// Server-generated order id (e.g. ORD-20250825-1001)
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<OrderLine>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub pricing: Pricing,
    pub note: Option<String>,
}

impl CommandHandler for PlaceOrderAction {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::OrderEmpty);
        }
        if self.customer_id.trim().is_empty() {
            return Err(OrderError::InvalidOperation(
                "customer_id must not be empty".to_string(),
            ));
        }
        validate_pricing(&self.items, &self.pricing)?;

        let status = match self.payment_method {
            PaymentMethod::CashOnDelivery => OrderStatus::Confirmed,
            PaymentMethod::Online => OrderStatus::Pending,
        };

        let event = OrderEvent::new(
            ctx.next_sequence(),
            self.order_id.clone(),
            metadata.actor_id.clone(),
            metadata.actor_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            OrderEventType::OrderCreated,
            EventPayload::OrderCreated {
                customer_id: self.customer_id.clone(),
                items: self.items.clone(),
                shipping_address: self.shipping_address.clone(),
                billing_address: self.billing_address.clone(),
                pricing: self.pricing.clone(),
                payment_method: self.payment_method,
                status,
                note: self.note.clone(),
            },
        );

        Ok(vec![event])
    }
}
