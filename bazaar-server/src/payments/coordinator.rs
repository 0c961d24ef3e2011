//! Payment coordinator
//!
//! Drives the payment leg of an online order: creates the gateway intent
//! (with bounded retry), verifies signed callbacks and webhooks, settles
//! the payment through the orders manager and finalizes the stock hold.
//!
//! A failed or tampered payment attempt does not cancel the order. The
//! order is parked in an in-memory grace window instead, so the customer
//! can retry; the expiry sweeper cancels it once the window lapses.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{
    OrderCommand, OrderCommandPayload, OrderSnapshot, OrderStatus, PaymentMethod, PaymentStatus,
};
use shared::util::now_millis;

use crate::core::Config;
use crate::inventory::ReservationManager;
use crate::orders::manager::OrdersManager;
use crate::orders::service::require_command_success;

use super::gateway::{GatewayError, GatewayIntent, PaymentGateway};
use super::signature::{callback_message, SignatureKey};

/// Actor stamped on commands issued by the coordinator.
const ACTOR_ID: &str = "system";
const ACTOR_NAME: &str = "payment-coordinator";

/// Gateway calls per intent before giving up.
const INTENT_ATTEMPTS: u32 = 3;
/// Base backoff between attempts; doubles each retry.
const INTENT_BACKOFF_MS: u64 = 200;

/// Client-relayed payment result, signed by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub gateway_order_ref: String,
    pub gateway_payment_ref: String,
    /// Hex HMAC over `"{gateway_order_ref}|{gateway_payment_ref}"`.
    pub signature: String,
}

/// Server-to-server webhook body. The signature covers the raw bytes,
/// so this is only parsed after verification.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    gateway_order_ref: String,
    #[serde(default)]
    gateway_payment_ref: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// What a verified webhook ended up doing.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookOutcome {
    Settled { order_id: String },
    FailureRecorded { order_id: String },
    Ignored,
}

pub struct PaymentCoordinator {
    manager: Arc<OrdersManager>,
    reservations: ReservationManager,
    gateway: Arc<dyn PaymentGateway>,
    callback_key: SignatureKey,
    webhook_key: SignatureKey,
    /// order_id -> millis of the last failed payment attempt
    grace: DashMap<String, i64>,
    grace_seconds: i64,
}

impl PaymentCoordinator {
    pub fn new(
        manager: Arc<OrdersManager>,
        reservations: ReservationManager,
        gateway: Arc<dyn PaymentGateway>,
        config: &Config,
    ) -> Self {
        Self {
            manager,
            reservations,
            gateway,
            callback_key: SignatureKey::new(&config.payment_key_secret),
            webhook_key: SignatureKey::new(&config.payment_webhook_secret),
            grace: DashMap::new(),
            grace_seconds: config.payment_grace_seconds,
        }
    }

    /// Create a gateway intent for a pending online order and record its
    /// reference on the order.
    pub async fn initiate(&self, order: &OrderSnapshot) -> AppResult<GatewayIntent> {
        if order.payment.method != PaymentMethod::Online {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                format!("order {} is not an online-payment order", order.order_id),
            ));
        }
        if order.payment.is_completed() {
            return Err(AppError::with_message(
                ErrorCode::PaymentAlreadySettled,
                format!("payment for order {} is already settled", order.order_id),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::business_rule(format!(
                "order {} is {} and cannot take a payment",
                order.order_id, order.status
            )));
        }

        let intent = self.create_intent_with_retry(order).await?;

        let response = self.manager.execute_command(OrderCommand::new(
            ACTOR_ID,
            ACTOR_NAME,
            OrderCommandPayload::RecordPaymentIntent {
                order_id: order.order_id.clone(),
                gateway_order_ref: intent.gateway_order_ref.clone(),
            },
        ));
        require_command_success(response)?;

        info!(
            order_id = %order.order_id,
            gateway_order_ref = %intent.gateway_order_ref,
            "Payment intent recorded"
        );
        Ok(intent)
    }

    async fn create_intent_with_retry(&self, order: &OrderSnapshot) -> AppResult<GatewayIntent> {
        let mut attempt = 0;
        loop {
            match self
                .gateway
                .create_intent(&order.order_id, order.pricing.total, &order.pricing.currency)
                .await
            {
                Ok(intent) => return Ok(intent),
                Err(GatewayError::Rejected(reason)) => {
                    warn!(order_id = %order.order_id, reason = %reason, "Gateway rejected payment intent");
                    return Err(AppError::with_message(ErrorCode::GatewayRejected, reason));
                }
                Err(GatewayError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt >= INTENT_ATTEMPTS {
                        error!(
                            order_id = %order.order_id,
                            attempts = attempt,
                            reason = %reason,
                            "Gateway unreachable, giving up"
                        );
                        return Err(AppError::gateway_unavailable(reason));
                    }
                    let backoff = INTENT_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(
                        order_id = %order.order_id,
                        attempt,
                        backoff_ms = backoff,
                        "Gateway unavailable, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    /// Handle the client-relayed payment callback.
    ///
    /// The signature is checked before anything else; a mismatch records a
    /// payment failure (the callback travelled through the client and may
    /// have been tampered with) and leaves the order open for a retry.
    pub fn handle_callback(&self, callback: &PaymentCallback) -> AppResult<OrderSnapshot> {
        let order_id = self
            .resolve_order(&callback.gateway_order_ref)?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::PaymentRefMismatch,
                    format!(
                        "unknown gateway order reference {}",
                        callback.gateway_order_ref
                    ),
                )
            })?;

        let message = callback_message(&callback.gateway_order_ref, &callback.gateway_payment_ref);
        if !self.callback_key.verify(message.as_bytes(), &callback.signature) {
            warn!(order_id = %order_id, "Payment callback signature mismatch");
            self.record_failure(
                &order_id,
                Some(callback.gateway_order_ref.clone()),
                "callback signature mismatch",
            );
            return Err(AppError::signature_mismatch());
        }

        self.settle(
            &order_id,
            &callback.gateway_order_ref,
            &callback.gateway_payment_ref,
        )
    }

    /// Handle a server-to-server gateway webhook. `signature` must be the
    /// hex HMAC of the raw body bytes under the webhook secret.
    pub fn handle_webhook(&self, body: &[u8], signature: &str) -> AppResult<WebhookOutcome> {
        if !self.webhook_key.verify(body, signature) {
            warn!("Webhook signature mismatch");
            return Err(AppError::signature_mismatch());
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(body).map_err(|err| {
            AppError::with_message(
                ErrorCode::InvalidFormat,
                format!("invalid webhook body: {}", err),
            )
        })?;

        let Some(order_id) = self.resolve_order(&envelope.gateway_order_ref)? else {
            warn!(
                gateway_order_ref = %envelope.gateway_order_ref,
                "Webhook for unknown gateway reference"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        match envelope.event.as_str() {
            "payment.captured" => {
                let payment_ref = envelope.gateway_payment_ref.ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::RequiredField,
                        "payment.captured requires gateway_payment_ref",
                    )
                })?;
                match self.settle(&order_id, &envelope.gateway_order_ref, &payment_ref) {
                    Ok(_) => Ok(WebhookOutcome::Settled { order_id }),
                    Err(err)
                        if matches!(
                            err.code,
                            ErrorCode::InvalidTransition
                                | ErrorCode::OrderAlreadyCancelled
                                | ErrorCode::OrderAlreadyReturned
                        ) =>
                    {
                        // capture landed after the order closed; money moved
                        // at the gateway, so flag it for a manual refund
                        error!(
                            order_id = %order_id,
                            code = %u16::from(err.code),
                            "Late capture for closed order, manual refund required"
                        );
                        Ok(WebhookOutcome::Ignored)
                    }
                    Err(err) => Err(err),
                }
            }
            "payment.failed" => {
                let reason = envelope
                    .reason
                    .unwrap_or_else(|| "payment failed at gateway".to_string());
                if self.record_failure(&order_id, Some(envelope.gateway_order_ref), &reason) {
                    Ok(WebhookOutcome::FailureRecorded { order_id })
                } else {
                    Ok(WebhookOutcome::Ignored)
                }
            }
            other => {
                debug!(event = other, "Ignoring webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Orders whose grace window has lapsed; the expiry sweeper cancels
    /// these.
    pub fn grace_expired_orders(&self) -> Vec<String> {
        let cutoff = now_millis() - self.grace_seconds * 1000;
        self.grace
            .iter()
            .filter(|entry| *entry.value() <= cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn clear_grace(&self, order_id: &str) {
        self.grace.remove(order_id);
    }

    fn settle(
        &self,
        order_id: &str,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> AppResult<OrderSnapshot> {
        let response = self.manager.execute_command(OrderCommand::new(
            ACTOR_ID,
            ACTOR_NAME,
            OrderCommandPayload::SettlePayment {
                order_id: order_id.to_string(),
                gateway_order_ref: gateway_order_ref.to_string(),
                gateway_payment_ref: gateway_payment_ref.to_string(),
            },
        ));
        require_command_success(response)?;

        self.grace.remove(order_id);
        if let Err(err) = self.reservations.finalize_for_order(order_id) {
            // settlement stands; startup reconciliation repairs the hold
            error!(order_id = %order_id, error = %err, "Failed to finalize stock after settlement");
        }

        info!(order_id = %order_id, "Payment settled");
        self.require_order(order_id)
    }

    /// Record a failed attempt and open the grace window. Returns false if
    /// nothing was recorded: the manager refused the command (e.g. payment
    /// already settled) or the order closed in the meantime and the command
    /// was acknowledged as a no-op.
    fn record_failure(
        &self,
        order_id: &str,
        gateway_order_ref: Option<String>,
        reason: &str,
    ) -> bool {
        let response = self.manager.execute_command(OrderCommand::new(
            ACTOR_ID,
            ACTOR_NAME,
            OrderCommandPayload::RecordPaymentFailure {
                order_id: order_id.to_string(),
                gateway_order_ref,
                reason: reason.to_string(),
            },
        ));
        if !response.success {
            warn!(
                order_id = %order_id,
                error = ?response.error,
                "Payment failure not recorded"
            );
            return false;
        }
        match self.manager.get_snapshot(order_id) {
            Ok(Some(order))
                if order.payment.status == PaymentStatus::Failed && !order.is_terminal() =>
            {
                self.grace.insert(order_id.to_string(), now_millis());
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "Order unreadable after payment failure");
                false
            }
        }
    }

    fn resolve_order(&self, gateway_order_ref: &str) -> AppResult<Option<String>> {
        Ok(self.manager.find_order_by_gateway_ref(gateway_order_ref)?)
    }

    fn require_order(&self, order_id: &str) -> AppResult<OrderSnapshot> {
        self.manager.get_snapshot(order_id)?.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::OrderNotFound,
                format!("order {} not found", order_id),
            )
        })
    }

    #[cfg(test)]
    pub(crate) fn grace_contains(&self, order_id: &str) -> bool {
        self.grace.contains_key(order_id)
    }

    #[cfg(test)]
    pub(crate) fn backdate_grace(&self, order_id: &str, millis_ago: i64) {
        self.grace
            .insert(order_id.to_string(), now_millis() - millis_ago);
    }
}
