//! Bazaar Server - order placement and payment settlement for a retail marketplace
//!
//! # Architecture overview
//!
//! - **Catalog** (`catalog`): products and prices, the authority at placement
//! - **Inventory** (`inventory`): stock levels, reservations, seller sales
//! - **Orders** (`orders`): event-sourced order lifecycle on redb
//! - **Payments** (`payments`): gateway intents, signed callbacks, webhooks
//! - **HTTP API** (`api`): RESTful routes over the above
//!
//! # Module structure
//!
//! ```text
//! bazaar-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── api/           # HTTP routes and handlers
//! ├── catalog/       # product catalog store
//! ├── inventory/     # stock ledger and reservations
//! ├── orders/        # command pipeline, event log, services
//! ├── payments/      # gateway client and settlement coordinator
//! └── utils/         # logging and re-exported error types
//! ```

pub mod api;
pub mod catalog;
pub mod core;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export public types
pub use catalog::{CatalogProduct, CatalogStore};
pub use core::{Config, Server, ServerState};
pub use inventory::ReservationManager;
pub use orders::{OrderService, OrdersManager, OrderStorage};
pub use payments::PaymentCoordinator;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Prepare the process environment: load `.env`, then initialize logging
/// from `LOG_LEVEL` / `LOG_DIR` before any configuration is parsed.
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    if let Some(dir) = &log_dir {
        std::fs::create_dir_all(dir)?;
    }
    utils::logger::init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____
   / __ )____ _____  ____ ____ ______
  / __  / __ `/_  / / __ `/ __ `/ ___/
 / /_/ / /_/ / / /_/ /_/ / /_/ / /
/_____/\__,_/ /___/\__,_/\__,_/_/
    "#
    );
}
