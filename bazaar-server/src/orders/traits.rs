//! Command handler and event applier traits
//!
//! Commands are validated by a [`CommandHandler`] which reads order state
//! through a [`CommandContext`] and returns the events to record. Events are
//! then folded into snapshots by [`EventApplier`] implementations. Handlers
//! never write storage directly; everything they stage is persisted by the
//! manager inside a single transaction.

use std::collections::HashMap;

use enum_dispatch::enum_dispatch;
use redb::WriteTransaction;
use thiserror::Error;

use shared::order::{OrderCommand, OrderEvent, OrderSnapshot, OrderStatus};

#[allow(unused_imports)]
use super::appliers::{
    EventAction, OrderCancelledApplier, OrderCreatedApplier, OrderDeliveredApplier,
    OrderProcessingApplier, OrderReturnedApplier, OrderShippedApplier, PaymentFailedApplier,
    PaymentInitiatedApplier, PaymentSettledApplier,
};
use super::storage::{OrderStorage, StorageError};

/// Business-rule errors produced while executing a command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order must contain at least one item")]
    OrderEmpty,

    #[error("order {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("order {0} has already been delivered")]
    AlreadyDelivered(String),

    #[error("order {0} has already been returned")]
    AlreadyReturned(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("payment for order {0} is already settled")]
    PaymentAlreadySettled(String),

    #[error("gateway order reference does not match order {0}")]
    PaymentRefMismatch(String),

    #[error("no payment intent recorded for order {0}")]
    PaymentNotInitiated(String),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for OrderError {
    fn from(err: StorageError) -> Self {
        OrderError::Storage(err.to_string())
    }
}

/// Command metadata passed to every handler
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    pub command_id: String,
    pub actor_id: String,
    pub actor_name: String,
    /// Client timestamp (Unix milliseconds)
    pub timestamp: i64,
}

impl CommandMetadata {
    pub fn from_command(command: &OrderCommand) -> Self {
        Self {
            command_id: command.command_id.clone(),
            actor_id: command.actor_id.clone(),
            actor_name: command.actor_name.clone(),
            timestamp: command.timestamp,
        }
    }
}

/// Execution context for a single command
///
/// Wraps the open write transaction and caches snapshots staged by the
/// current command, so a handler (or the appliers that run after it) sees
/// its own uncommitted writes. Sequence numbers are allocated here and only
/// become durable when the manager commits.
pub struct CommandContext<'a> {
    txn: &'a WriteTransaction,
    storage: &'a OrderStorage,
    next_sequence: u64,
    snapshots: HashMap<String, OrderSnapshot>,
}

impl<'a> CommandContext<'a> {
    pub fn new(txn: &'a WriteTransaction, storage: &'a OrderStorage, current_sequence: u64) -> Self {
        Self {
            txn,
            storage,
            next_sequence: current_sequence + 1,
            snapshots: HashMap::new(),
        }
    }

    /// Allocate the next global event sequence number
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Load an order snapshot, preferring writes staged by this command
    pub fn load_snapshot(&mut self, order_id: &str) -> Result<OrderSnapshot, OrderError> {
        if let Some(snapshot) = self.snapshots.get(order_id) {
            return Ok(snapshot.clone());
        }
        match self.storage.get_snapshot_txn(self.txn, order_id) {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(OrderError::OrderNotFound(order_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Load the snapshot, or start an empty shell if none exists yet
    ///
    /// Used when folding an OrderCreated event, where the order has no
    /// prior state.
    pub fn load_or_new(&mut self, order_id: &str) -> Result<OrderSnapshot, OrderError> {
        match self.load_snapshot(order_id) {
            Ok(snapshot) => Ok(snapshot),
            Err(OrderError::OrderNotFound(_)) => Ok(OrderSnapshot::new(order_id.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Stage an updated snapshot for persistence on commit
    pub fn save_snapshot(&mut self, snapshot: OrderSnapshot) {
        self.snapshots.insert(snapshot.order_id.clone(), snapshot);
    }

    /// Snapshots staged by this command
    pub fn modified_snapshots(&self) -> impl Iterator<Item = &OrderSnapshot> {
        self.snapshots.values()
    }
}

/// Validates a command against current state and produces events
pub trait CommandHandler {
    fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError>;
}

/// Folds one event into an order snapshot
///
/// Appliers must be pure with respect to the snapshot: same snapshot plus
/// same event always yields the same result, so replaying the event stream
/// reproduces identical state (and an identical checksum).
#[enum_dispatch]
pub trait EventApplier {
    fn apply(&self, snapshot: &mut OrderSnapshot, event: &OrderEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderCommandPayload, OrderStatus};

    #[test]
    fn test_context_allocates_sequences_after_current() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 5);

        assert_eq!(ctx.next_sequence(), 6);
        assert_eq!(ctx.next_sequence(), 7);
        assert_eq!(ctx.next_sequence(), 8);
    }

    #[test]
    fn test_load_snapshot_missing_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 0);

        let err = ctx.load_snapshot("ORD-404").unwrap_err();
        assert_eq!(err, OrderError::OrderNotFound("ORD-404".to_string()));
    }

    #[test]
    fn test_load_prefers_staged_snapshot() {
        let storage = OrderStorage::open_in_memory().unwrap();

        // commit a PENDING snapshot
        let committed = OrderSnapshot::new("ORD-1".to_string());
        let txn = storage.begin_write().unwrap();
        storage.store_snapshot(&txn, &committed).unwrap();
        txn.commit().unwrap();

        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 0);

        let mut snapshot = ctx.load_snapshot("ORD-1").unwrap();
        assert_eq!(snapshot.status, OrderStatus::Pending);

        snapshot.status = OrderStatus::Confirmed;
        ctx.save_snapshot(snapshot);

        let reloaded = ctx.load_snapshot("ORD-1").unwrap();
        assert_eq!(reloaded.status, OrderStatus::Confirmed);
        assert_eq!(ctx.modified_snapshots().count(), 1);
    }

    #[test]
    fn test_load_or_new_starts_shell() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &storage, 0);

        let snapshot = ctx.load_or_new("ORD-NEW").unwrap();
        assert_eq!(snapshot.order_id, "ORD-NEW");
        assert_eq!(snapshot.status, OrderStatus::Pending);
        assert_eq!(snapshot.last_sequence, 0);
    }

    #[test]
    fn test_metadata_from_command() {
        let command = OrderCommand::new(
            "cust-1",
            "Asha",
            OrderCommandPayload::CancelOrder {
                order_id: "ORD-1".to_string(),
                reason: "changed my mind".to_string(),
            },
        );

        let metadata = CommandMetadata::from_command(&command);
        assert_eq!(metadata.command_id, command.command_id);
        assert_eq!(metadata.actor_id, "cust-1");
        assert_eq!(metadata.actor_name, "Asha");
        assert_eq!(metadata.timestamp, command.timestamp);
    }
}
