//! Payment gateway client
//!
//! The gateway is an external HTTP service that issues payment intents.
//! Errors split into [`GatewayError::Unavailable`] (transport trouble,
//! 5xx, timeouts; worth retrying) and [`GatewayError::Rejected`] (the
//! gateway said no; retrying will not help).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transient transport or gateway-side failure.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    /// The gateway refused the request.
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
}

/// A payment intent created at the gateway for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub gateway_order_ref: String,
    pub amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        order_id: &str,
        amount: f64,
        currency: &str,
    ) -> Result<GatewayIntent, GatewayError>;
}

/// Gateway client speaking JSON over HTTP with basic-auth API keys.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct IntentRequest<'a> {
    order_id: &'a str,
    amount: f64,
    currency: &'a str,
}

#[derive(Deserialize)]
struct IntentResponse {
    gateway_order_ref: String,
    #[serde(default)]
    checkout_url: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: &str,
        key_id: &str,
        key_secret: &str,
        timeout_ms: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        order_id: &str,
        amount: f64,
        currency: &str,
    ) -> Result<GatewayIntent, GatewayError> {
        let url = format!("{}/intents", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&IntentRequest {
                order_id,
                amount,
                currency,
            })
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(GatewayError::Unavailable(format!(
                "gateway returned {}",
                status
            )));
        }

        let body: IntentResponse = response.json().await.map_err(|err| {
            GatewayError::Unavailable(format!("invalid gateway response: {}", err))
        })?;

        Ok(GatewayIntent {
            gateway_order_ref: body.gateway_order_ref,
            amount,
            currency: currency.to_string(),
            checkout_url: body.checkout_url,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockGateway;
    use super::*;

    #[tokio::test]
    async fn test_mock_fails_then_recovers() {
        let gateway = MockGateway::failing_first(2);
        for _ in 0..2 {
            let err = gateway.create_intent("ORD-1", 100.0, "INR").await;
            assert!(matches!(err, Err(GatewayError::Unavailable(_))));
        }
        let intent = gateway.create_intent("ORD-1", 100.0, "INR").await.unwrap();
        assert_eq!(intent.gateway_order_ref, "gw_ORD-1");
        assert_eq!(intent.amount, 100.0);
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_rejecting() {
        let gateway = MockGateway::rejecting();
        let err = gateway.create_intent("ORD-1", 100.0, "INR").await;
        assert!(matches!(err, Err(GatewayError::Rejected(_))));
    }
}
