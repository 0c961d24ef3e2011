//! Inventory: stock levels, reservations, seller sales accrual.

pub mod ledger;
pub mod manager;

pub use ledger::{
    InventoryLedger, LedgerError, LedgerResult, ReleaseOutcome, ReservationRecord,
    ReservationState, ReservedLine, SellerSales, StockLevel,
};
pub use manager::ReservationManager;
