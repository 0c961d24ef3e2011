//! Payment API handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::OrderSnapshot;

use crate::core::ServerState;
use crate::payments::{PaymentCallback, WebhookOutcome};

const WEBHOOK_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Gateway redirect callback: settles the payment when the signature checks out
pub async fn callback(
    State(state): State<ServerState>,
    Json(payload): Json<PaymentCallback>,
) -> AppResult<Json<OrderSnapshot>> {
    let order = state.payments.handle_callback(&payload)?;
    Ok(Json(order))
}

/// Gateway webhook: signature is over the raw body, so the body is taken
/// as bytes and parsed only after verification
pub async fn webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookOutcome>> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::RequiredField,
                format!("{} header is required", WEBHOOK_SIGNATURE_HEADER),
            )
        })?;

    let outcome = state.payments.handle_webhook(&body, signature)?;
    Ok(Json(outcome))
}
