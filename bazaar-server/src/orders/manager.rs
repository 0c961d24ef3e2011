//! Orders manager - the single write path for order state
//!
//! Every mutation flows through [`OrdersManager::execute_command`]:
//! idempotency check, action execution, event fold, persistence, all inside
//! one redb write transaction. Events are broadcast to subscribers
//! (notification dispatcher, request handlers awaiting side effects) only
//! after the transaction commits.

use std::path::Path;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::error::AppError;
use shared::order::{
    CommandError, CommandErrorCode, CommandResponse, EventPayload, OrderCommand,
    OrderCommandPayload, OrderEvent, OrderSnapshot,
};

use super::actions::{CommandAction, PlaceOrderAction};
use super::appliers::EventAction;
use super::storage::{OrderStorage, StorageError, StorageStats};
use super::traits::{CommandContext, CommandHandler, CommandMetadata, EventApplier, OrderError};

/// Capacity of the post-commit event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 65536;

/// Errors from the command pipeline
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Action(#[from] OrderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

/// Map a low-level storage message onto a retryable error code.
///
/// redb surfaces I/O failures as strings; we pattern-match the common
/// fatal conditions so clients can distinguish "retry later" from "the
/// disk is full".
fn classify_storage_error(message: &str) -> CommandErrorCode {
    let lower = message.to_lowercase();
    if lower.contains("no space") || lower.contains("disk full") || lower.contains("enospc") {
        CommandErrorCode::StorageFull
    } else if lower.contains("out of memory") || lower.contains("cannot allocate") {
        CommandErrorCode::OutOfMemory
    } else if lower.contains("corrupt") || lower.contains("invalid database") {
        CommandErrorCode::StorageCorrupted
    } else {
        CommandErrorCode::SystemBusy
    }
}

impl From<ManagerError> for CommandError {
    fn from(err: ManagerError) -> Self {
        let message = err.to_string();
        let code = match &err {
            ManagerError::Action(action_err) => match action_err {
                OrderError::OrderNotFound(_) => CommandErrorCode::OrderNotFound,
                OrderError::OrderEmpty => CommandErrorCode::OrderEmpty,
                OrderError::AlreadyCancelled(_) => CommandErrorCode::OrderAlreadyCancelled,
                OrderError::AlreadyDelivered(_) => CommandErrorCode::OrderAlreadyDelivered,
                OrderError::AlreadyReturned(_) => CommandErrorCode::OrderAlreadyReturned,
                OrderError::InvalidTransition { .. } => CommandErrorCode::InvalidTransition,
                OrderError::PaymentAlreadySettled(_) => CommandErrorCode::PaymentAlreadySettled,
                OrderError::PaymentRefMismatch(_) => CommandErrorCode::PaymentRefMismatch,
                OrderError::PaymentNotInitiated(_) => CommandErrorCode::PaymentNotInitiated,
                OrderError::InvalidAmount(_) => CommandErrorCode::InvalidAmount,
                OrderError::InvalidOperation(_) => CommandErrorCode::InvalidOperation,
                OrderError::Storage(msg) => classify_storage_error(msg),
            },
            ManagerError::Storage(storage_err) => match storage_err {
                StorageError::Serialization(_) => CommandErrorCode::InternalError,
                StorageError::OrderNotFound(_) => CommandErrorCode::OrderNotFound,
                other => classify_storage_error(&other.to_string()),
            },
            ManagerError::Internal(_) => CommandErrorCode::InternalError,
        };
        CommandError::new(code, message)
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(storage_err) => AppError::database(storage_err.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

/// Orders manager
#[derive(Clone)]
pub struct OrdersManager {
    storage: OrderStorage,
    event_tx: broadcast::Sender<OrderEvent>,
    /// Fresh per process start; lets consumers detect a server restart
    epoch: String,
}

impl OrdersManager {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ManagerError> {
        let storage = OrderStorage::open(db_path)?;
        Ok(Self::with_storage(storage))
    }

    pub fn with_storage(storage: OrderStorage) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let epoch = Uuid::new_v4().to_string();
        info!(epoch = %epoch, "orders manager initialized");
        Self {
            storage,
            event_tx,
            epoch,
        }
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    /// Subscribe to committed events
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.event_tx.subscribe()
    }

    /// Execute a command, translating failures into an error response
    pub fn execute_command(&self, command: OrderCommand) -> CommandResponse {
        self.execute_command_inner(command, None)
    }

    /// Place an order under a pre-allocated order number.
    ///
    /// The service allocates the number first (see
    /// [`allocate_order_number`](Self::allocate_order_number)) so stock can
    /// be reserved against the order id before the command runs.
    pub fn execute_place_order(&self, command: OrderCommand, order_id: String) -> CommandResponse {
        self.execute_command_inner(command, Some(order_id))
    }

    fn execute_command_inner(
        &self,
        command: OrderCommand,
        preassigned_order_id: Option<String>,
    ) -> CommandResponse {
        let command_id = command.command_id.clone();
        let command_name = command.payload.name();
        match self.process_command(command, preassigned_order_id) {
            Ok(response) => response,
            Err(err) => {
                warn!(command_id = %command_id, command = command_name, error = %err, "command rejected");
                CommandResponse::error(command_id, CommandError::from(err))
            }
        }
    }

    fn process_command(
        &self,
        command: OrderCommand,
        preassigned_order_id: Option<String>,
    ) -> Result<CommandResponse, ManagerError> {
        // cheap duplicate check before opening a write transaction
        if self.storage.is_command_processed(&command.command_id)? {
            debug!(command_id = %command.command_id, "duplicate command acknowledged");
            return Ok(CommandResponse::duplicate(command.command_id));
        }

        // The order number counter commits its own transaction, and redb
        // allows one writer, so PlaceOrder ids are settled before the main
        // transaction opens.
        let new_order_id = if matches!(command.payload, OrderCommandPayload::PlaceOrder { .. }) {
            match preassigned_order_id {
                Some(order_id) => Some(order_id),
                None => Some(self.allocate_order_number()?),
            }
        } else {
            None
        };

        let txn = self.storage.begin_write()?;

        // second check inside the transaction closes the race between two
        // concurrent deliveries of the same command
        if self
            .storage
            .is_command_processed_txn(&txn, &command.command_id)?
        {
            return Ok(CommandResponse::duplicate(command.command_id));
        }

        let current_sequence = self.storage.get_current_sequence()?;
        let metadata = CommandMetadata::from_command(&command);

        let action = match (&command.payload, new_order_id.clone()) {
            (
                OrderCommandPayload::PlaceOrder {
                    customer_id,
                    items,
                    shipping_address,
                    billing_address,
                    payment_method,
                    pricing,
                    note,
                },
                Some(order_id),
            ) => CommandAction::PlaceOrder(PlaceOrderAction {
                order_id,
                customer_id: customer_id.clone(),
                items: items.clone(),
                shipping_address: shipping_address.clone(),
                billing_address: billing_address.clone(),
                payment_method: *payment_method,
                pricing: pricing.clone(),
                note: note.clone(),
            }),
            _ => CommandAction::from(&command),
        };

        let (events, snapshots) = {
            let mut ctx = CommandContext::new(&txn, &self.storage, current_sequence);
            let events = action.execute(&mut ctx, &metadata)?;

            for event in &events {
                let mut snapshot = ctx.load_or_new(&event.order_id)?;
                let applier: EventAction = event.into();
                applier.apply(&mut snapshot, event);
                ctx.save_snapshot(snapshot);
            }

            let snapshots: Vec<OrderSnapshot> = ctx.modified_snapshots().cloned().collect();
            (events, snapshots)
        };

        let mut max_sequence = current_sequence;
        for event in &events {
            self.storage.store_event(&txn, event)?;
            if event.sequence > max_sequence {
                max_sequence = event.sequence;
            }
            // webhooks look orders up by the gateway's reference
            if let EventPayload::PaymentInitiated { gateway_order_ref } = &event.payload {
                self.storage
                    .index_gateway_ref(&txn, gateway_order_ref, &event.order_id)?;
            }
        }

        for snapshot in &snapshots {
            self.storage.store_snapshot(&txn, snapshot)?;
            if snapshot.is_terminal() {
                self.storage.mark_order_inactive(&txn, &snapshot.order_id)?;
            } else {
                self.storage.mark_order_active(&txn, &snapshot.order_id)?;
            }
        }

        if max_sequence > current_sequence {
            self.storage.set_sequence(&txn, max_sequence)?;
        }

        self.storage
            .mark_command_processed(&txn, &command.command_id)?;
        txn.commit().map_err(StorageError::from)?;

        debug!(
            command_id = %command.command_id,
            command = command.payload.name(),
            events = events.len(),
            "command committed"
        );

        for event in events {
            // a lagging or absent subscriber must not fail the command
            let _ = self.event_tx.send(event);
        }

        let order_id = new_order_id.or_else(|| command.order_id().map(str::to_string));
        Ok(CommandResponse::success(command.command_id, order_id))
    }

    /// Allocate the next order number, e.g. ORD-20250825-1001.
    ///
    /// The counter only moves forward; numbers allocated for orders that
    /// never place (reservation failed, command rejected) are skipped.
    pub fn allocate_order_number(&self) -> Result<String, ManagerError> {
        let count = self.storage.next_order_count()?;
        Ok(format!(
            "ORD-{}-{}",
            chrono::Local::now().format("%Y%m%d"),
            1000 + count
        ))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_snapshot(&self, order_id: &str) -> Result<Option<OrderSnapshot>, ManagerError> {
        Ok(self.storage.get_snapshot(order_id)?)
    }

    pub fn get_all_snapshots(&self) -> Result<Vec<OrderSnapshot>, ManagerError> {
        Ok(self.storage.get_all_snapshots()?)
    }

    pub fn get_active_orders(&self) -> Result<Vec<OrderSnapshot>, ManagerError> {
        Ok(self.storage.get_active_orders()?)
    }

    pub fn get_events_for_order(&self, order_id: &str) -> Result<Vec<OrderEvent>, ManagerError> {
        Ok(self.storage.get_events_for_order(order_id)?)
    }

    pub fn find_order_by_gateway_ref(
        &self,
        gateway_order_ref: &str,
    ) -> Result<Option<String>, ManagerError> {
        Ok(self.storage.find_order_by_gateway_ref(gateway_order_ref)?)
    }

    pub fn stats(&self) -> Result<StorageStats, ManagerError> {
        Ok(self.storage.get_stats()?)
    }

    /// Verify stored checksums for all active orders, returning the ids
    /// whose snapshots have drifted. Run at startup.
    pub fn verify_active_snapshots(&self) -> Result<Vec<String>, ManagerError> {
        let mut drifted = Vec::new();
        for snapshot in self.storage.get_active_orders()? {
            if !snapshot.verify_checksum() {
                warn!(order_id = %snapshot.order_id, "snapshot checksum drift detected");
                drifted.push(snapshot.order_id);
            }
        }
        Ok(drifted)
    }
}
