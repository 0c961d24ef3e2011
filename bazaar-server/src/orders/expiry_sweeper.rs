//! Expiry sweeper
//!
//! Periodic task that cancels online orders whose payment never arrived:
//! pending orders older than the payment window, and orders whose
//! post-failure grace window lapsed. Cancellation goes through the
//! regular service path, so stock release and notifications follow.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shared::order::{OrderStatus, PaymentMethod};
use shared::util::now_millis;

use crate::core::Config;
use crate::payments::PaymentCoordinator;

use super::manager::OrdersManager;
use super::service::OrderService;

/// How often the sweeper scans active orders.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Actor stamped on sweeper-issued cancellations.
const ACTOR_ID: &str = "system";
const ACTOR_NAME: &str = "expiry-sweeper";

pub struct ExpirySweeper {
    service: OrderService,
    manager: Arc<OrdersManager>,
    payments: Arc<PaymentCoordinator>,
    expiry_millis: i64,
}

impl ExpirySweeper {
    pub fn new(
        service: OrderService,
        manager: Arc<OrdersManager>,
        payments: Arc<PaymentCoordinator>,
        config: &Config,
    ) -> Self {
        Self {
            service,
            manager,
            payments,
            expiry_millis: config.payment_expiry_minutes * 60 * 1000,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        info!(
            expiry_minutes = self.expiry_millis / 60_000,
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep();
                }
            }
        }
        info!("Expiry sweeper stopped");
    }

    /// One pass over both expiry sources. Returns how many orders were
    /// cancelled.
    pub fn sweep(&self) -> usize {
        let mut cancelled = 0;
        let now = now_millis();

        // unpaid online orders past the absolute payment window
        match self.manager.get_active_orders() {
            Ok(orders) => {
                for order in orders {
                    let unpaid_online = order.status == OrderStatus::Pending
                        && order.payment.method == PaymentMethod::Online;
                    if unpaid_online && now - order.created_at >= self.expiry_millis {
                        cancelled += self.cancel(&order.order_id, "payment window expired");
                    }
                }
            }
            Err(err) => warn!(error = %err, "Active order scan failed"),
        }

        // orders whose post-failure grace lapsed; re-check state, a
        // settlement may have raced the entry
        for order_id in self.payments.grace_expired_orders() {
            match self.service.get_order(&order_id) {
                Ok(order) if order.status == OrderStatus::Pending => {
                    cancelled +=
                        self.cancel(&order_id, "payment failed and grace period expired");
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(
                        order_id = %order_id,
                        error = %err.message,
                        "Grace entry without a matching order"
                    );
                }
            }
            self.payments.clear_grace(&order_id);
        }

        if cancelled > 0 {
            info!(cancelled, "Expiry sweep cancelled unpaid orders");
        }
        cancelled
    }

    fn cancel(&self, order_id: &str, reason: &str) -> usize {
        match self
            .service
            .cancel_order(order_id, ACTOR_ID, ACTOR_NAME, reason)
        {
            Ok(_) => {
                info!(order_id = %order_id, reason, "Unpaid order cancelled");
                1
            }
            Err(err) => {
                // racing a settlement or an earlier cancel is fine
                debug!(order_id = %order_id, error = %err.message, "Expiry cancel skipped");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogProduct, CatalogStore};
    use crate::inventory::{InventoryLedger, ReservationManager, ReservationState};
    use crate::orders::service::CreateOrderRequest;
    use crate::orders::storage::OrderStorage;
    use crate::payments::gateway::mock::MockGateway;
    use shared::order::{Address, OrderLineInput};

    struct SweepHarness {
        sweeper: ExpirySweeper,
        service: OrderService,
        manager: Arc<OrdersManager>,
        reservations: ReservationManager,
        payments: Arc<PaymentCoordinator>,
    }

    fn harness(expiry_minutes: i64) -> SweepHarness {
        let mut config = Config::with_overrides(Some("unused".to_string()), Some(0));
        config.currency = "INR".to_string();
        config.shipping_fee = 50.0;
        config.free_shipping_threshold = 1000.0;
        config.tax_rate_percent = 0.0;
        config.payment_key_secret = "callback-secret".to_string();
        config.payment_webhook_secret = "webhook-secret".to_string();
        config.payment_expiry_minutes = expiry_minutes;
        config.payment_grace_seconds = 300;
        let config = Arc::new(config);

        let manager = Arc::new(OrdersManager::with_storage(
            OrderStorage::open_in_memory().unwrap(),
        ));
        let catalog = CatalogStore::open_in_memory().unwrap();
        let reservations = ReservationManager::new(InventoryLedger::open_in_memory().unwrap());
        let payments = Arc::new(PaymentCoordinator::new(
            manager.clone(),
            reservations.clone(),
            Arc::new(MockGateway::working()),
            &config,
        ));
        let service = OrderService::new(
            manager.clone(),
            catalog.clone(),
            reservations.clone(),
            payments.clone(),
            config.clone(),
        );
        let sweeper = ExpirySweeper::new(
            service.clone(),
            manager.clone(),
            payments.clone(),
            &config,
        );

        catalog
            .upsert_product(&CatalogProduct {
                product_id: "P1".to_string(),
                seller_id: "S1".to_string(),
                name: "Product P1".to_string(),
                description: None,
                price: 100.0,
                is_purchasable: true,
                created_at: 0,
                updated_at: 0,
            })
            .unwrap();
        reservations.set_stock("P1", 10).unwrap();

        SweepHarness {
            sweeper,
            service,
            manager,
            reservations,
            payments,
        }
    }

    async fn place(harness: &SweepHarness, method: PaymentMethod) -> String {
        let response = harness
            .service
            .create_order(CreateOrderRequest {
                customer_id: "cust-1".to_string(),
                items: vec![OrderLineInput {
                    product_id: "P1".to_string(),
                    quantity: 2,
                    variant: None,
                }],
                shipping_address: Address::default(),
                billing_address: None,
                payment_method: method,
                note: None,
            })
            .await
            .unwrap();
        response.order.order_id
    }

    #[tokio::test]
    async fn test_sweep_cancels_expired_pending_online() {
        // a zero-minute window expires orders immediately
        let harness = harness(0);
        let online = place(&harness, PaymentMethod::Online).await;
        let cod = place(&harness, PaymentMethod::CashOnDelivery).await;

        assert_eq!(harness.sweeper.sweep(), 1);

        let order = harness.manager.get_snapshot(&online).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let record = harness.reservations.reservation(&online).unwrap().unwrap();
        assert_eq!(record.state, ReservationState::Released);

        // confirmed COD order is untouched
        let order = harness.manager.get_snapshot(&cod).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_orders_alone() {
        let harness = harness(30);
        let online = place(&harness, PaymentMethod::Online).await;

        assert_eq!(harness.sweeper.sweep(), 0);
        let order = harness.manager.get_snapshot(&online).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_cancels_grace_expired_order() {
        let harness = harness(30);
        let online = place(&harness, PaymentMethod::Online).await;

        harness.payments.backdate_grace(&online, 301_000);
        assert_eq!(harness.sweeper.sweep(), 1);

        let order = harness.manager.get_snapshot(&online).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(!harness.payments.grace_contains(&online));
    }

    #[tokio::test]
    async fn test_sweep_drops_stale_grace_for_settled_order() {
        let harness = harness(30);
        let online = place(&harness, PaymentMethod::Online).await;

        // settle through the manager, then plant a stale grace entry
        let order = harness.manager.get_snapshot(&online).unwrap().unwrap();
        let gateway_order_ref = order.payment.gateway_order_ref.unwrap();
        let response = harness.manager.execute_command(shared::order::OrderCommand::new(
            "system",
            "payment-coordinator",
            shared::order::OrderCommandPayload::SettlePayment {
                order_id: online.clone(),
                gateway_order_ref,
                gateway_payment_ref: "pay_1".to_string(),
            },
        ));
        assert!(response.success);
        harness.payments.backdate_grace(&online, 301_000);

        assert_eq!(harness.sweeper.sweep(), 0);

        let order = harness.manager.get_snapshot(&online).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(!harness.payments.grace_contains(&online));
    }
}
