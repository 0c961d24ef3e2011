//! Order domain: event-sourced command pipeline and lifecycle services.
//!
//! - **manager**: OrdersManager, the single writer for command processing
//! - **storage**: redb persistence for events, snapshots, and indices
//! - **actions** / **appliers**: per-command validation and event folding
//! - **state_machine**: the legal status transition table
//! - **pricing**: order totals from catalog prices and config
//! - **service**: the orchestration layer the API calls
//! - **notifier**: event-driven customer notifications
//! - **expiry_sweeper**: cancels orders whose payment window lapsed
//!
//! # Data flow
//!
//! ```text
//! Command → OrdersManager → Events → Storage (redb)
//!                 ↓                      ↓
//!             Broadcast           Snapshot update
//!                 ↓
//!         NotificationDispatcher
//! ```
//!
//! Every command is validated against the current snapshot, becomes one or
//! more events with a global sequence number, and is committed atomically
//! with the updated snapshot before anything is broadcast.

pub mod actions;
pub mod appliers;
pub mod expiry_sweeper;
pub mod manager;
pub mod notifier;
pub mod pricing;
pub mod service;
pub mod state_machine;
pub mod storage;
pub mod traits;

// Re-exports
pub use expiry_sweeper::ExpirySweeper;
pub use manager::{ManagerError, OrdersManager};
pub use notifier::{NotificationDispatcher, NotificationMessage};
pub use service::{CreateOrderRequest, CreateOrderResponse, OrderService, ReconcileReport};
pub use storage::{NotifyDeadLetter, OrderStorage, StorageError, StorageStats};
pub use traits::OrderError;

// Re-export shared types for convenience
pub use shared::order::{
    CommandError, CommandErrorCode, CommandResponse, EventPayload, OrderCommand,
    OrderCommandPayload, OrderEvent, OrderEventType, OrderSnapshot, OrderStatus,
};
