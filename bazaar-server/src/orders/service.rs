//! Order service
//!
//! REST-facing orchestration for the order lifecycle. The service owns the
//! placement sequence (resolve products, price server-side, hold stock,
//! run the place command, kick off payment) and the stock side effects
//! that follow lifecycle commands: cancellation releases the hold,
//! delivery finalizes it. [`OrderService::reconcile`] repairs holds left
//! behind by a crash between those steps.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use validator::Validate;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{
    Address, CommandError, CommandErrorCode, CommandResponse, OrderCommand, OrderCommandPayload,
    OrderEvent, OrderLine, OrderLineInput, OrderSnapshot, OrderStatus, PaymentMethod, ShipmentInfo,
};
use shared::request::PaginationQuery;
use shared::response::PaginatedResponse;

use crate::catalog::{CatalogError, CatalogStore};
use crate::core::Config;
use crate::inventory::ReservationManager;
use crate::payments::{GatewayIntent, PaymentCoordinator};

use super::manager::OrdersManager;
use super::pricing::{
    compute_pricing, line_total, validate_line_input, validate_unit_price, PricingConfig,
};
use super::traits::OrderError;

/// Order placement request. Prices are never taken from the client; only
/// product references and quantities are.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "customer_id must not be empty"))]
    pub customer_id: String,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderLineInput>,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderSnapshot,
    /// Gateway intent for online orders; absent for cash on delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<GatewayIntent>,
    /// Set when the order was placed but payment initiation failed. The
    /// order stays open for a payment retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_error: Option<String>,
}

/// What startup reconciliation did to the stock holds it found.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub released: usize,
    pub finalized: usize,
    pub kept: usize,
    /// Active snapshots whose checksum no longer matches their event log.
    pub drifted: usize,
}

pub(crate) fn command_error_to_app(err: CommandError) -> AppError {
    let code = match err.code {
        CommandErrorCode::OrderNotFound => ErrorCode::OrderNotFound,
        CommandErrorCode::OrderEmpty => ErrorCode::OrderEmpty,
        CommandErrorCode::OrderAlreadyCancelled => ErrorCode::OrderAlreadyCancelled,
        CommandErrorCode::OrderAlreadyDelivered => ErrorCode::OrderAlreadyDelivered,
        CommandErrorCode::OrderAlreadyReturned => ErrorCode::OrderAlreadyReturned,
        CommandErrorCode::InvalidTransition => ErrorCode::InvalidTransition,
        CommandErrorCode::PaymentAlreadySettled => ErrorCode::PaymentAlreadySettled,
        CommandErrorCode::PaymentRefMismatch => ErrorCode::PaymentRefMismatch,
        CommandErrorCode::PaymentNotInitiated => ErrorCode::PaymentNotInitiated,
        CommandErrorCode::InvalidAmount => ErrorCode::ValueOutOfRange,
        CommandErrorCode::InvalidOperation => ErrorCode::InvalidRequest,
        CommandErrorCode::DuplicateCommand => ErrorCode::DuplicateCommand,
        CommandErrorCode::InternalError => ErrorCode::InternalError,
        CommandErrorCode::StorageFull => ErrorCode::StorageFull,
        CommandErrorCode::OutOfMemory => ErrorCode::OutOfMemory,
        CommandErrorCode::StorageCorrupted => ErrorCode::StorageCorrupted,
        CommandErrorCode::SystemBusy => ErrorCode::SystemBusy,
    };
    AppError::with_message(code, err.message)
}

/// Turn a failed [`CommandResponse`] into an [`AppError`], passing a
/// successful one through.
pub(crate) fn require_command_success(response: CommandResponse) -> AppResult<CommandResponse> {
    if response.success {
        return Ok(response);
    }
    let command_id = response.command_id.clone();
    Err(response.error.map(command_error_to_app).unwrap_or_else(|| {
        AppError::internal(format!("command {} failed without error detail", command_id))
    }))
}

fn line_input_error(err: OrderError) -> AppError {
    match err {
        OrderError::InvalidAmount(msg) => AppError::with_message(ErrorCode::InvalidQuantity, msg),
        other => AppError::business_rule(other.to_string()),
    }
}

#[derive(Clone)]
pub struct OrderService {
    manager: Arc<OrdersManager>,
    catalog: CatalogStore,
    reservations: ReservationManager,
    payments: Arc<PaymentCoordinator>,
    config: Arc<Config>,
}

impl OrderService {
    pub fn new(
        manager: Arc<OrdersManager>,
        catalog: CatalogStore,
        reservations: ReservationManager,
        payments: Arc<PaymentCoordinator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            manager,
            catalog,
            reservations,
            payments,
            config,
        }
    }

    /// Place an order.
    ///
    /// Stock is held before the place command runs, keyed by the order
    /// number, so the number is allocated up front. If the command is
    /// rejected the hold is released and the number is simply skipped.
    pub async fn create_order(&self, request: CreateOrderRequest) -> AppResult<CreateOrderResponse> {
        request
            .validate()
            .map_err(|err| AppError::business_rule(err.to_string()))?;
        for item in &request.items {
            validate_line_input(item).map_err(line_input_error)?;
        }

        let lines = self.resolve_lines(&request.items)?;
        let pricing = compute_pricing(&lines, &PricingConfig::from(self.config.as_ref()));
        let billing_address = request
            .billing_address
            .clone()
            .unwrap_or_else(|| request.shipping_address.clone());

        let order_id = self.manager.allocate_order_number()?;
        self.reservations.reserve_for_order(&order_id, &lines)?;

        let command = OrderCommand::new(
            request.customer_id.clone(),
            "customer",
            OrderCommandPayload::PlaceOrder {
                customer_id: request.customer_id.clone(),
                items: lines,
                shipping_address: request.shipping_address.clone(),
                billing_address,
                payment_method: request.payment_method,
                pricing,
                note: request.note.clone(),
            },
        );

        let response = self.manager.execute_place_order(command, order_id.clone());
        if !response.success {
            if let Err(release_err) = self.reservations.release_for_order(&order_id) {
                error!(
                    order_id = %order_id,
                    error = %release_err,
                    "Failed to release hold for rejected order"
                );
            }
            return Err(response
                .error
                .map(command_error_to_app)
                .unwrap_or_else(|| AppError::internal("order rejected without error detail")));
        }

        let order = self.require_order(&order_id)?;
        info!(
            order_id = %order_id,
            customer_id = %order.customer_id,
            total = order.pricing.total,
            "Order placed"
        );

        if order.payment.method == PaymentMethod::CashOnDelivery {
            return Ok(CreateOrderResponse {
                order,
                payment: None,
                gateway_error: None,
            });
        }

        match self.payments.initiate(&order).await {
            Ok(intent) => {
                let order = self.require_order(&order_id)?;
                Ok(CreateOrderResponse {
                    order,
                    payment: Some(intent),
                    gateway_error: None,
                })
            }
            Err(err) => {
                // order and hold stay; the client can retry payment, and
                // the expiry sweeper reclaims the stock if nobody does
                warn!(order_id = %order_id, error = %err.message, "Payment initiation failed");
                Ok(CreateOrderResponse {
                    order,
                    payment: None,
                    gateway_error: Some(err.message),
                })
            }
        }
    }

    /// Re-run payment initiation for a pending online order.
    pub async fn retry_payment(&self, order_id: &str) -> AppResult<CreateOrderResponse> {
        let order = self.require_order(order_id)?;
        let intent = self.payments.initiate(&order).await?;
        // fresh intent, fresh attempt; a previous failure no longer counts
        self.payments.clear_grace(order_id);

        let order = self.require_order(order_id)?;
        Ok(CreateOrderResponse {
            order,
            payment: Some(intent),
            gateway_error: None,
        })
    }

    pub fn get_order(&self, order_id: &str) -> AppResult<OrderSnapshot> {
        self.require_order(order_id)
    }

    pub fn get_order_events(&self, order_id: &str) -> AppResult<Vec<OrderEvent>> {
        self.require_order(order_id)?;
        Ok(self.manager.get_events_for_order(order_id)?)
    }

    /// List orders, newest first, optionally filtered by customer and
    /// status.
    pub fn list_orders(
        &self,
        customer_id: Option<&str>,
        status: Option<OrderStatus>,
        page: &PaginationQuery,
    ) -> AppResult<PaginatedResponse<OrderSnapshot>> {
        let mut orders = self.manager.get_all_snapshots()?;
        if let Some(customer_id) = customer_id {
            orders.retain(|order| order.customer_id == customer_id);
        }
        if let Some(status) = status {
            orders.retain(|order| order.status == status);
        }
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = orders.len() as u64;
        let items: Vec<OrderSnapshot> = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PaginatedResponse::new(items, page.page, page.per_page, total))
    }

    pub fn cancel_order(
        &self,
        order_id: &str,
        actor_id: &str,
        actor_name: &str,
        reason: &str,
    ) -> AppResult<OrderSnapshot> {
        let response = self.manager.execute_command(OrderCommand::new(
            actor_id,
            actor_name,
            OrderCommandPayload::CancelOrder {
                order_id: order_id.to_string(),
                reason: reason.to_string(),
            },
        ));
        require_command_success(response)?;

        if let Err(err) = self.reservations.release_for_order(order_id) {
            // a paid order has a finalized hold; cancellation then means a
            // refund, not a restock
            warn!(order_id = %order_id, error = %err.message, "Hold not released on cancellation");
        }
        self.payments.clear_grace(order_id);

        self.require_order(order_id)
    }

    pub fn return_order(
        &self,
        order_id: &str,
        actor_id: &str,
        actor_name: &str,
        reason: Option<String>,
    ) -> AppResult<OrderSnapshot> {
        let response = self.manager.execute_command(OrderCommand::new(
            actor_id,
            actor_name,
            OrderCommandPayload::ReturnOrder {
                order_id: order_id.to_string(),
                reason,
            },
        ));
        require_command_success(response)?;
        self.require_order(order_id)
    }

    /// Move an order through fulfilment (PROCESSING / SHIPPED / DELIVERED).
    pub fn update_status(
        &self,
        order_id: &str,
        actor_id: &str,
        actor_name: &str,
        status: OrderStatus,
        shipment: Option<ShipmentInfo>,
    ) -> AppResult<OrderSnapshot> {
        let response = self.manager.execute_command(OrderCommand::new(
            actor_id,
            actor_name,
            OrderCommandPayload::UpdateStatus {
                order_id: order_id.to_string(),
                status,
                shipment,
            },
        ));
        require_command_success(response)?;

        let order = self.require_order(order_id)?;
        if order.status == OrderStatus::Delivered {
            // settles the hold; for online orders already finalized at
            // payment time this is a no-op
            if let Err(err) = self.reservations.finalize_for_order(order_id) {
                error!(
                    order_id = %order_id,
                    error = %err.message,
                    "Failed to finalize stock for delivered order"
                );
            }
        }
        Ok(order)
    }

    /// Repair stock holds after a restart.
    ///
    /// A crash can leave a hold behind for an order that was never placed,
    /// was cancelled, or was paid without the hold being finalized. Each
    /// held reservation is checked against its order and released,
    /// finalized or kept accordingly.
    pub fn reconcile(&self) -> AppResult<ReconcileReport> {
        let drifted = self.manager.verify_active_snapshots()?.len();
        let mut report = ReconcileReport {
            drifted,
            ..Default::default()
        };

        for reservation in self.reservations.held_reservations()? {
            let order_id = reservation.order_id;
            match self.manager.get_snapshot(&order_id)? {
                None => {
                    // reserve happened, the place command never did
                    self.reservations.release_for_order(&order_id)?;
                    report.released += 1;
                }
                Some(order) if order.status == OrderStatus::Cancelled => {
                    self.reservations.release_for_order(&order_id)?;
                    report.released += 1;
                }
                Some(order) if order.payment.is_completed() => {
                    self.reservations.finalize_for_order(&order_id)?;
                    report.finalized += 1;
                }
                Some(_) => report.kept += 1,
            }
        }

        if report.released > 0 || report.finalized > 0 {
            info!(
                released = report.released,
                finalized = report.finalized,
                "Reconciliation repaired stock holds"
            );
        }
        if report.drifted > 0 {
            warn!(
                count = report.drifted,
                "Active snapshots drifted from their event logs"
            );
        }
        Ok(report)
    }

    fn resolve_lines(&self, inputs: &[OrderLineInput]) -> AppResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(inputs.len());
        for input in inputs {
            let product = self
                .catalog
                .get_product(&input.product_id)?
                .ok_or_else(|| CatalogError::ProductNotFound(input.product_id.clone()))?;
            if !product.is_purchasable {
                return Err(AppError::with_message(
                    ErrorCode::ProductNotPurchasable,
                    format!("product {} is not purchasable", product.product_id),
                ));
            }
            validate_unit_price(product.price).map_err(|err| {
                AppError::with_message(ErrorCode::ProductInvalidPrice, err.to_string())
                    .with_detail("product_id", product.product_id.clone())
            })?;

            lines.push(OrderLine {
                line_total: line_total(product.price, input.quantity),
                product_id: product.product_id,
                seller_id: product.seller_id,
                name: product.name,
                unit_price: product.price,
                quantity: input.quantity,
                variant: input.variant.clone(),
            });
        }
        Ok(lines)
    }

    fn require_order(&self, order_id: &str) -> AppResult<OrderSnapshot> {
        self.manager.get_snapshot(order_id)?.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::OrderNotFound,
                format!("order {} not found", order_id),
            )
        })
    }
}
