//! Server state
//!
//! One struct owning a handle to every service. Cloning is shallow; all
//! components are `Arc`-backed or hold their own `Arc<Database>`.

use std::sync::Arc;

use anyhow::Context;

use crate::catalog::CatalogStore;
use crate::core::{BackgroundTasks, Config, Result, TaskKind};
use crate::inventory::{InventoryLedger, ReservationManager};
use crate::orders::{ExpirySweeper, NotificationDispatcher, OrderService, OrdersManager};
use crate::payments::{HttpPaymentGateway, PaymentCoordinator};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    /// Resolved configuration
    pub config: Arc<Config>,
    /// Event-sourced order store, the single command writer
    pub manager: Arc<OrdersManager>,
    /// Product catalog, the pricing authority
    pub catalog: CatalogStore,
    /// Stock levels and reservations
    pub reservations: ReservationManager,
    /// Gateway integration and settlement
    pub payments: Arc<PaymentCoordinator>,
    /// Orchestration layer the API calls
    pub service: OrderService,
}

impl ServerState {
    /// Open the databases and wire every service together.
    ///
    /// Order matters only in that the coordinator needs the manager and the
    /// reservation manager, and the service needs all of them.
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir))?;

        let manager = Arc::new(
            OrdersManager::new(config.orders_db_path()).context("opening order store")?,
        );
        let ledger =
            InventoryLedger::open(config.inventory_db_path()).context("opening inventory ledger")?;
        let catalog =
            CatalogStore::open(config.catalog_db_path()).context("opening product catalog")?;
        let reservations = ReservationManager::new(ledger);

        let gateway = HttpPaymentGateway::new(
            &config.payment_gateway_url,
            &config.payment_key_id,
            &config.payment_key_secret,
            config.gateway_timeout_ms,
        )
        .context("building payment gateway client")?;

        let payments = Arc::new(PaymentCoordinator::new(
            manager.clone(),
            reservations.clone(),
            Arc::new(gateway),
            config,
        ));

        let config = Arc::new(config.clone());
        let service = OrderService::new(
            manager.clone(),
            catalog.clone(),
            reservations.clone(),
            payments.clone(),
            config.clone(),
        );

        Ok(Self {
            config,
            manager,
            catalog,
            reservations,
            payments,
            service,
        })
    }

    /// Spawn the long-running tasks. Must be called before `Server::run`
    /// starts accepting requests; the returned registry drives shutdown.
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        // Heal inventory holds that drifted from order state while down
        let service = self.service.clone();
        tasks.spawn("startup_reconcile", TaskKind::Warmup, async move {
            match service.reconcile() {
                Ok(report) => tracing::info!(
                    released = report.released,
                    finalized = report.finalized,
                    kept = report.kept,
                    drifted = report.drifted,
                    "Startup reconciliation finished"
                ),
                Err(e) => tracing::error!("Startup reconciliation failed: {}", e),
            }
        });

        let dispatcher = NotificationDispatcher::new(self.manager.clone(), &self.config);
        let token = tasks.shutdown_token();
        tasks.spawn("notification_dispatcher", TaskKind::Worker, async move {
            dispatcher.run(token).await;
        });

        let sweeper = ExpirySweeper::new(
            self.service.clone(),
            self.manager.clone(),
            self.payments.clone(),
            &self.config,
        );
        let token = tasks.shutdown_token();
        tasks.spawn("expiry_sweeper", TaskKind::Periodic, async move {
            sweeper.run(token).await;
        });

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config::with_overrides(Some(dir.path().to_string_lossy().into_owned()), Some(0))
    }

    #[tokio::test]
    async fn test_initialize_creates_databases() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let state = ServerState::initialize(&config).unwrap();

        assert!(config.orders_db_path().exists());
        assert!(config.inventory_db_path().exists());
        assert!(config.catalog_db_path().exists());

        let stats = state.manager.stats().unwrap();
        assert_eq!(stats.event_count, 0);
        assert_eq!(stats.active_order_count, 0);
    }

    #[tokio::test]
    async fn test_background_tasks_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let state = ServerState::initialize(&config).unwrap();

        let tasks = state.start_background_tasks();
        // give the warmup reconcile a moment to run
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tasks.shutdown().await;
    }
}
