//! Payments: gateway client, signature verification, settlement coordination.

pub mod coordinator;
pub mod gateway;
pub mod signature;

pub use coordinator::{PaymentCallback, PaymentCoordinator, WebhookOutcome};
pub use gateway::{GatewayError, GatewayIntent, HttpPaymentGateway, PaymentGateway};
pub use signature::SignatureKey;
