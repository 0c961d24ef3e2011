//! Reservation manager
//!
//! Domain-facing facade over the [`InventoryLedger`]. Order code talks to
//! this type in terms of order lines and [`AppError`]; the ledger underneath
//! deals in raw stock movements.

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::OrderLine;

use super::ledger::{
    InventoryLedger, LedgerError, ReleaseOutcome, ReservationRecord, ReservedLine, SellerSales,
    StockLevel,
};

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock {
                product_id,
                requested,
                available,
            } => AppError::insufficient_stock(product_id, requested, available),
            LedgerError::InvalidQuantity(product_id) => {
                AppError::new(ErrorCode::InvalidQuantity).with_detail("product_id", product_id)
            }
            LedgerError::NegativeStock(product_id) => AppError::with_message(
                ErrorCode::InvalidQuantity,
                "stock count must not be negative",
            )
            .with_detail("product_id", product_id),
            LedgerError::ReservationNotFound(order_id) => {
                AppError::new(ErrorCode::ReservationNotFound).with_detail("order_id", order_id)
            }
            LedgerError::ReservationExists(order_id) => {
                AppError::conflict(format!("reservation already exists for order {}", order_id))
            }
            LedgerError::AlreadyFinalized(order_id) => {
                AppError::new(ErrorCode::ReservationAlreadyFinalized)
                    .with_detail("order_id", order_id)
            }
            LedgerError::AlreadyReleased(order_id) => {
                AppError::with_message(
                    ErrorCode::ReservationAlreadyFinalized,
                    format!("reservation for order {} was already released", order_id),
                )
            }
            other => AppError::database(other.to_string()),
        }
    }
}

/// Holds, releases and finalizes stock on behalf of orders.
#[derive(Clone)]
pub struct ReservationManager {
    ledger: InventoryLedger,
}

impl ReservationManager {
    pub fn new(ledger: InventoryLedger) -> Self {
        Self { ledger }
    }

    /// Hold stock for every line of an order. Fails without moving anything
    /// if any line cannot be covered.
    pub fn reserve_for_order(&self, order_id: &str, lines: &[OrderLine]) -> AppResult<()> {
        let reserved: Vec<ReservedLine> = lines
            .iter()
            .map(|line| ReservedLine {
                product_id: line.product_id.clone(),
                seller_id: line.seller_id.clone(),
                quantity: line.quantity as i64,
                line_total: line.line_total,
            })
            .collect();

        self.ledger.reserve(order_id, &reserved)?;
        tracing::debug!(order_id = %order_id, lines = lines.len(), "Stock reserved");
        Ok(())
    }

    /// Return held stock to the pool. Safe to retry; releasing an unknown or
    /// already-released reservation is a no-op.
    pub fn release_for_order(&self, order_id: &str) -> AppResult<ReleaseOutcome> {
        let outcome = self.ledger.release(order_id)?;
        match outcome {
            ReleaseOutcome::Released => {
                tracing::info!(order_id = %order_id, "Reservation released");
            }
            ReleaseOutcome::AlreadyReleased => {
                tracing::debug!(order_id = %order_id, "Reservation was already released");
            }
            ReleaseOutcome::NotFound => {
                tracing::debug!(order_id = %order_id, "No reservation to release");
            }
        }
        Ok(outcome)
    }

    /// Consume the hold and accrue seller sales. Safe to retry.
    pub fn finalize_for_order(&self, order_id: &str) -> AppResult<()> {
        self.ledger.finalize(order_id)?;
        tracing::info!(order_id = %order_id, "Reservation finalized");
        Ok(())
    }

    pub fn set_stock(&self, product_id: &str, available: i64) -> AppResult<StockLevel> {
        Ok(self.ledger.set_stock(product_id, available)?)
    }

    pub fn stock_level(&self, product_id: &str) -> AppResult<StockLevel> {
        Ok(self.ledger.stock(product_id)?)
    }

    pub fn all_stock(&self) -> AppResult<Vec<(String, StockLevel)>> {
        Ok(self.ledger.all_stock()?)
    }

    pub fn reservation(&self, order_id: &str) -> AppResult<Option<ReservationRecord>> {
        Ok(self.ledger.reservation(order_id)?)
    }

    pub fn held_reservations(&self) -> AppResult<Vec<ReservationRecord>> {
        Ok(self.ledger.held_reservations()?)
    }

    pub fn seller_sales(&self, seller_id: &str) -> AppResult<SellerSales> {
        Ok(self.ledger.seller_sales(seller_id)?)
    }
}
