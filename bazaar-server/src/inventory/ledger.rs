//! redb-based inventory ledger
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `stock` | `product_id` | `StockLevel` | Total / available / reserved counts |
//! | `reservations` | `order_id` | `ReservationRecord` | Holds with lifecycle state |
//! | `seller_sales` | `seller_id` | `SellerSales` | Accrued on finalize |
//!
//! # Oversell protection
//!
//! `reserve` checks and deducts every line inside a single write transaction.
//! redb serializes writers, so two orders racing for the last unit cannot
//! both succeed. A reservation moves quantity from `available` to `reserved`;
//! `release` moves it back, `finalize` consumes it and accrues seller sales.
//! Sold units leave `reserved` but stay in `total`, so
//! `total - available - reserved` is the lifetime sold count and
//! `available + reserved <= total` holds at every commit.
//!
//! Reservations are never deleted, only transitioned. That makes `release`
//! and `finalize` safe to retry after a crash between the order commit and
//! the ledger side effect.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::util::now_millis;

/// Table for stock levels: key = product_id, value = JSON-serialized StockLevel
const STOCK_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("stock");

/// Table for reservations: key = order_id, value = JSON-serialized ReservationRecord
const RESERVATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("reservations");

/// Table for seller sales accrual: key = seller_id, value = JSON-serialized SellerSales
const SELLER_SALES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("seller_sales");

/// Stock counts for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Units the ledger accounts for, sold ones included
    pub total: i64,
    /// Units free to reserve
    pub available: i64,
    /// Units held by active reservations
    pub reserved: i64,
}

impl StockLevel {
    /// True when every count is non-negative and on-shelf plus held units
    /// fit inside `total`.
    pub fn is_consistent(&self) -> bool {
        self.total >= 0
            && self.available >= 0
            && self.reserved >= 0
            && self.available + self.reserved <= self.total
    }

    /// Units that left the shelf for good.
    pub fn sold(&self) -> i64 {
        self.total - self.available - self.reserved
    }
}

/// Lifecycle of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// Stock is held, waiting for payment or cancellation
    Held,
    /// Stock was returned to `available`
    Released,
    /// Stock was sold; seller sales accrued
    Finalized,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Held => "HELD",
            ReservationState::Released => "RELEASED",
            ReservationState::Finalized => "FINALIZED",
        }
    }
}

/// One reserved order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedLine {
    pub product_id: String,
    pub seller_id: String,
    pub quantity: i64,
    /// Line total at placement time, accrued to the seller on finalize
    pub line_total: f64,
}

/// A hold on stock for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub order_id: String,
    pub lines: Vec<ReservedLine>,
    pub state: ReservationState,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Accrued sales for one seller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellerSales {
    pub units_sold: i64,
    pub gross_amount: f64,
    pub updated_at: i64,
}

/// What `release` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Stock was returned to `available`
    Released,
    /// Reservation was already released; nothing changed
    AlreadyReleased,
    /// No reservation for this order; nothing changed
    NotFound,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error("Invalid quantity for {0}: must be positive")]
    InvalidQuantity(String),

    #[error("Invalid stock count for {0}: must not be negative")]
    NegativeStock(String),

    #[error(
        "Stock invariant violated for {product_id}: total {total}, available {available}, reserved {reserved}"
    )]
    InvariantViolated {
        product_id: String,
        total: i64,
        available: i64,
        reserved: i64,
    },

    #[error("Reservation already exists for order {0}")]
    ReservationExists(String),

    #[error("Reservation not found for order {0}")]
    ReservationNotFound(String),

    #[error("Reservation for order {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("Reservation for order {0} was already released")]
    AlreadyReleased(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Inventory ledger backed by redb.
#[derive(Clone)]
pub struct InventoryLedger {
    db: Arc<Database>,
}

impl InventoryLedger {
    /// Open or create the ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory ledger (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> LedgerResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn init_tables(db: &Database) -> LedgerResult<()> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(STOCK_TABLE)?;
            let _ = write_txn.open_table(RESERVATIONS_TABLE)?;
            let _ = write_txn.open_table(SELLER_SALES_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========== Stock Operations ==========

    /// Every stock write passes this gate; a level that breaks the
    /// `available + reserved <= total` accounting aborts the transaction
    /// instead of being clamped into shape.
    fn ensure_consistent(product_id: &str, level: &StockLevel) -> LedgerResult<()> {
        if level.is_consistent() {
            return Ok(());
        }
        Err(LedgerError::InvariantViolated {
            product_id: product_id.to_string(),
            total: level.total,
            available: level.available,
            reserved: level.reserved,
        })
    }

    /// Set the on-shelf count for a product. The reserved count is left
    /// untouched so a restock cannot clobber active holds; `total` shifts
    /// by the same delta, keeping the sold remainder intact.
    pub fn set_stock(&self, product_id: &str, available: i64) -> LedgerResult<StockLevel> {
        if available < 0 {
            return Err(LedgerError::NegativeStock(product_id.to_string()));
        }

        let txn = self.db.begin_write()?;
        let level = {
            let mut table = txn.open_table(STOCK_TABLE)?;

            let mut level = match table.get(product_id)? {
                Some(value) => serde_json::from_slice::<StockLevel>(value.value())?,
                None => StockLevel::default(),
            };
            level.total += available - level.available;
            level.available = available;

            Self::ensure_consistent(product_id, &level)?;
            let value = serde_json::to_vec(&level)?;
            table.insert(product_id, value.as_slice())?;
            level
        };
        txn.commit()?;
        Ok(level)
    }

    /// Current stock level for a product. Unknown products read as zero.
    pub fn stock(&self, product_id: &str) -> LedgerResult<StockLevel> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STOCK_TABLE)?;

        match table.get(product_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(StockLevel::default()),
        }
    }

    /// All known stock levels, ordered by product_id.
    pub fn all_stock(&self) -> LedgerResult<Vec<(String, StockLevel)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STOCK_TABLE)?;

        let mut levels = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let level: StockLevel = serde_json::from_slice(value.value())?;
            levels.push((key.value().to_string(), level));
        }

        Ok(levels)
    }

    // ========== Reservation Lifecycle ==========

    /// Hold stock for every line of an order, all-or-nothing.
    ///
    /// Requirements are accumulated per product first so repeated lines for
    /// the same product are checked against the combined quantity. If any
    /// product falls short the transaction is dropped and no stock moves.
    pub fn reserve(&self, order_id: &str, lines: &[ReservedLine]) -> LedgerResult<()> {
        for line in lines {
            if line.quantity <= 0 {
                return Err(LedgerError::InvalidQuantity(line.product_id.clone()));
            }
        }

        let mut required: BTreeMap<&str, i64> = BTreeMap::new();
        for line in lines {
            *required.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
        }

        let txn = self.db.begin_write()?;
        {
            let mut reservations = txn.open_table(RESERVATIONS_TABLE)?;
            if reservations.get(order_id)?.is_some() {
                return Err(LedgerError::ReservationExists(order_id.to_string()));
            }

            let mut stock = txn.open_table(STOCK_TABLE)?;

            // Check everything before moving anything.
            let mut levels: BTreeMap<&str, StockLevel> = BTreeMap::new();
            for (&product_id, &quantity) in &required {
                let level = match stock.get(product_id)? {
                    Some(value) => serde_json::from_slice::<StockLevel>(value.value())?,
                    None => StockLevel::default(),
                };
                if level.available < quantity {
                    return Err(LedgerError::InsufficientStock {
                        product_id: product_id.to_string(),
                        requested: quantity,
                        available: level.available,
                    });
                }
                levels.insert(product_id, level);
            }

            for (&product_id, &quantity) in &required {
                let level = levels
                    .get_mut(product_id)
                    .ok_or_else(|| LedgerError::ReservationNotFound(product_id.to_string()))?;
                level.available -= quantity;
                level.reserved += quantity;
                Self::ensure_consistent(product_id, level)?;
                let value = serde_json::to_vec(level)?;
                stock.insert(product_id, value.as_slice())?;
            }

            let record = ReservationRecord {
                order_id: order_id.to_string(),
                lines: lines.to_vec(),
                state: ReservationState::Held,
                created_at: now_millis(),
                updated_at: now_millis(),
            };
            let value = serde_json::to_vec(&record)?;
            reservations.insert(order_id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Return held stock to `available`. Safe to call more than once; only
    /// a finalized reservation refuses to release.
    pub fn release(&self, order_id: &str) -> LedgerResult<ReleaseOutcome> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut reservations = txn.open_table(RESERVATIONS_TABLE)?;

            let mut record = match reservations.get(order_id)? {
                Some(value) => serde_json::from_slice::<ReservationRecord>(value.value())?,
                None => return Ok(ReleaseOutcome::NotFound),
            };

            match record.state {
                ReservationState::Released => return Ok(ReleaseOutcome::AlreadyReleased),
                ReservationState::Finalized => {
                    return Err(LedgerError::AlreadyFinalized(order_id.to_string()));
                }
                ReservationState::Held => {}
            }

            let mut stock = txn.open_table(STOCK_TABLE)?;
            for line in &record.lines {
                let mut level = match stock.get(line.product_id.as_str())? {
                    Some(value) => serde_json::from_slice::<StockLevel>(value.value())?,
                    None => StockLevel::default(),
                };
                level.available += line.quantity;
                level.reserved -= line.quantity;
                Self::ensure_consistent(line.product_id.as_str(), &level)?;
                let value = serde_json::to_vec(&level)?;
                stock.insert(line.product_id.as_str(), value.as_slice())?;
            }

            record.state = ReservationState::Released;
            record.updated_at = now_millis();
            let value = serde_json::to_vec(&record)?;
            reservations.insert(order_id, value.as_slice())?;

            ReleaseOutcome::Released
        };
        txn.commit()?;
        Ok(outcome)
    }

    /// Consume a held reservation and accrue seller sales. Calling again on
    /// an already-finalized reservation is a no-op.
    pub fn finalize(&self, order_id: &str) -> LedgerResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut reservations = txn.open_table(RESERVATIONS_TABLE)?;

            let mut record = match reservations.get(order_id)? {
                Some(value) => serde_json::from_slice::<ReservationRecord>(value.value())?,
                None => return Err(LedgerError::ReservationNotFound(order_id.to_string())),
            };

            match record.state {
                ReservationState::Finalized => return Ok(()),
                ReservationState::Released => {
                    return Err(LedgerError::AlreadyReleased(order_id.to_string()));
                }
                ReservationState::Held => {}
            }

            let mut stock = txn.open_table(STOCK_TABLE)?;
            for line in &record.lines {
                let mut level = match stock.get(line.product_id.as_str())? {
                    Some(value) => serde_json::from_slice::<StockLevel>(value.value())?,
                    None => StockLevel::default(),
                };
                level.reserved -= line.quantity;
                Self::ensure_consistent(line.product_id.as_str(), &level)?;
                let value = serde_json::to_vec(&level)?;
                stock.insert(line.product_id.as_str(), value.as_slice())?;
            }

            let mut sales = txn.open_table(SELLER_SALES_TABLE)?;
            let mut accrued: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
            for line in &record.lines {
                let entry = accrued.entry(line.seller_id.as_str()).or_insert((0, 0.0));
                entry.0 += line.quantity;
                entry.1 += line.line_total;
            }
            for (seller_id, (units, amount)) in accrued {
                let mut record = match sales.get(seller_id)? {
                    Some(value) => serde_json::from_slice::<SellerSales>(value.value())?,
                    None => SellerSales::default(),
                };
                record.units_sold += units;
                record.gross_amount += amount;
                record.updated_at = now_millis();
                let value = serde_json::to_vec(&record)?;
                sales.insert(seller_id, value.as_slice())?;
            }

            record.state = ReservationState::Finalized;
            record.updated_at = now_millis();
            let value = serde_json::to_vec(&record)?;
            reservations.insert(order_id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Look up the reservation for an order.
    pub fn reservation(&self, order_id: &str) -> LedgerResult<Option<ReservationRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESERVATIONS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All reservations still in `Held` state. Used by the startup
    /// reconciliation pass.
    pub fn held_reservations(&self) -> LedgerResult<Vec<ReservationRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESERVATIONS_TABLE)?;

        let mut held = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let record: ReservationRecord = serde_json::from_slice(value.value())?;
            if record.state == ReservationState::Held {
                held.push(record);
            }
        }

        Ok(held)
    }

    /// Accrued sales for a seller. Unknown sellers read as zero.
    pub fn seller_sales(&self, seller_id: &str) -> LedgerResult<SellerSales> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SELLER_SALES_TABLE)?;

        match table.get(seller_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(SellerSales::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: &str, seller_id: &str, quantity: i64, line_total: f64) -> ReservedLine {
        ReservedLine {
            product_id: product_id.to_string(),
            seller_id: seller_id.to_string(),
            quantity,
            line_total,
        }
    }

    #[test]
    fn test_set_and_get_stock() {
        let ledger = InventoryLedger::open_in_memory().unwrap();

        assert_eq!(ledger.stock("P1").unwrap(), StockLevel::default());

        ledger.set_stock("P1", 10).unwrap();
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 10);
        assert_eq!(level.available, 10);
        assert_eq!(level.reserved, 0);
    }

    #[test]
    fn test_set_stock_rejects_negative() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 3).unwrap();

        let err = ledger.set_stock("P1", -1).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeStock(_)));

        // nothing written
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 3);
        assert_eq!(level.available, 3);
    }

    #[test]
    fn test_set_stock_preserves_reserved() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 10).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 4, 400.0)])
            .unwrap();

        // restock while a hold is active
        ledger.set_stock("P1", 20).unwrap();
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 24);
        assert_eq!(level.available, 20);
        assert_eq!(level.reserved, 4);
    }

    #[test]
    fn test_reserve_moves_stock() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();

        ledger
            .reserve("order-1", &[line("P1", "S1", 2, 1000.0)])
            .unwrap();

        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 5);
        assert_eq!(level.available, 3);
        assert_eq!(level.reserved, 2);

        let record = ledger.reservation("order-1").unwrap().unwrap();
        assert_eq!(record.state, ReservationState::Held);
        assert_eq!(record.lines.len(), 1);
    }

    #[test]
    fn test_reserve_insufficient_stock() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 1).unwrap();

        let err = ledger
            .reserve("order-1", &[line("P1", "S1", 2, 1000.0)])
            .unwrap_err();

        match err {
            LedgerError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, "P1");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // nothing moved, no reservation recorded
        assert_eq!(ledger.stock("P1").unwrap().available, 1);
        assert!(ledger.reservation("order-1").unwrap().is_none());
    }

    #[test]
    fn test_reserve_all_or_nothing() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 10).unwrap();
        ledger.set_stock("P2", 1).unwrap();

        let err = ledger.reserve(
            "order-1",
            &[line("P1", "S1", 2, 200.0), line("P2", "S1", 5, 500.0)],
        );
        assert!(err.is_err());

        // the P1 deduction must not survive the failed P2 check
        assert_eq!(ledger.stock("P1").unwrap().available, 10);
        assert_eq!(ledger.stock("P2").unwrap().available, 1);
    }

    #[test]
    fn test_reserve_accumulates_repeated_product() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 3).unwrap();

        // two lines of the same product totalling 4 > 3 available
        let err = ledger.reserve(
            "order-1",
            &[line("P1", "S1", 2, 200.0), line("P1", "S1", 2, 200.0)],
        );
        assert!(matches!(
            err,
            Err(LedgerError::InsufficientStock { requested: 4, .. })
        ));
        assert_eq!(ledger.stock("P1").unwrap().available, 3);
    }

    #[test]
    fn test_reserve_rejects_nonpositive_quantity() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();

        let err = ledger.reserve("order-1", &[line("P1", "S1", 0, 0.0)]);
        assert!(matches!(err, Err(LedgerError::InvalidQuantity(_))));
    }

    #[test]
    fn test_reserve_duplicate_order() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 1, 100.0)])
            .unwrap();

        let err = ledger.reserve("order-1", &[line("P1", "S1", 1, 100.0)]);
        assert!(matches!(err, Err(LedgerError::ReservationExists(_))));
        assert_eq!(ledger.stock("P1").unwrap().available, 4);
    }

    #[test]
    fn test_release_returns_stock_and_is_idempotent() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 3, 300.0)])
            .unwrap();

        assert_eq!(
            ledger.release("order-1").unwrap(),
            ReleaseOutcome::Released
        );
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 5);
        assert_eq!(level.available, 5);
        assert_eq!(level.reserved, 0);

        // second release: no-op, stock unchanged
        assert_eq!(
            ledger.release("order-1").unwrap(),
            ReleaseOutcome::AlreadyReleased
        );
        assert_eq!(ledger.stock("P1").unwrap().available, 5);

        // unknown reservation: no-op
        assert_eq!(ledger.release("order-x").unwrap(), ReleaseOutcome::NotFound);
    }

    #[test]
    fn test_finalize_accrues_seller_sales() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();
        ledger.set_stock("P2", 5).unwrap();
        ledger
            .reserve(
                "order-1",
                &[line("P1", "S1", 2, 1000.0), line("P2", "S2", 1, 250.0)],
            )
            .unwrap();

        ledger.finalize("order-1").unwrap();

        // reserved consumed, available untouched, sold units stay in total
        let p1 = ledger.stock("P1").unwrap();
        assert_eq!(p1.total, 5);
        assert_eq!(p1.available, 3);
        assert_eq!(p1.reserved, 0);
        assert_eq!(p1.sold(), 2);

        let s1 = ledger.seller_sales("S1").unwrap();
        assert_eq!(s1.units_sold, 2);
        assert_eq!(s1.gross_amount, 1000.0);
        let s2 = ledger.seller_sales("S2").unwrap();
        assert_eq!(s2.units_sold, 1);
        assert_eq!(s2.gross_amount, 250.0);

        // idempotent: second finalize must not double the accrual
        ledger.finalize("order-1").unwrap();
        assert_eq!(ledger.seller_sales("S1").unwrap().units_sold, 2);
    }

    #[test]
    fn test_total_keeps_sold_across_restock() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 10).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 3, 300.0)])
            .unwrap();
        ledger.finalize("order-1").unwrap();

        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 10);
        assert_eq!(level.available, 7);
        assert_eq!(level.sold(), 3);

        // restock back to 10 on the shelf; the sold remainder survives
        ledger.set_stock("P1", 10).unwrap();
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 13);
        assert_eq!(level.available, 10);
        assert_eq!(level.reserved, 0);
        assert_eq!(level.sold(), 3);
    }

    #[test]
    fn test_release_after_finalize_rejected() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 1, 100.0)])
            .unwrap();
        ledger.finalize("order-1").unwrap();

        let err = ledger.release("order-1").unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyFinalized(_)));
    }

    #[test]
    fn test_finalize_after_release_rejected() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 5).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 1, 100.0)])
            .unwrap();
        ledger.release("order-1").unwrap();

        let err = ledger.finalize("order-1").unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyReleased(_)));

        let err = ledger.finalize("order-x").unwrap_err();
        assert!(matches!(err, LedgerError::ReservationNotFound(_)));
    }

    #[test]
    fn test_held_reservations() {
        let ledger = InventoryLedger::open_in_memory().unwrap();
        ledger.set_stock("P1", 10).unwrap();
        ledger
            .reserve("order-1", &[line("P1", "S1", 1, 100.0)])
            .unwrap();
        ledger
            .reserve("order-2", &[line("P1", "S1", 1, 100.0)])
            .unwrap();
        ledger.release("order-1").unwrap();

        let held = ledger.held_reservations().unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].order_id, "order-2");
    }

    #[test]
    fn test_concurrent_reserve_no_oversell() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ledger = Arc::new(InventoryLedger::open_in_memory().unwrap());
        ledger.set_stock("P1", 5).unwrap();

        let successes = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            let successes = Arc::clone(&successes);
            handles.push(std::thread::spawn(move || {
                let order_id = format!("order-{}", i);
                match ledger.reserve(&order_id, &[line("P1", "S1", 1, 100.0)]) {
                    Ok(()) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(LedgerError::InsufficientStock { .. }) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // exactly 5 of 20 competing orders may win
        assert_eq!(successes.load(Ordering::SeqCst), 5);
        let level = ledger.stock("P1").unwrap();
        assert_eq!(level.total, 5);
        assert_eq!(level.available, 0);
        assert_eq!(level.reserved, 5);
        assert!(level.is_consistent());
    }
}
