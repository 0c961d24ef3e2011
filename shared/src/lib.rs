//! Shared types for the Bazaar marketplace
//!
//! Common types used by the order server and its clients: the order
//! event-sourcing model, the unified error system, response structures,
//! and utility types.

pub mod error;
pub mod order;
pub mod request;
pub mod response;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

// Order model re-exports (for convenient access)
pub use order::{OrderCommand, OrderCommandPayload, OrderEvent, OrderSnapshot, OrderStatus};
