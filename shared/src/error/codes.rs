//! Unified error codes for the Bazaar marketplace
//!
//! This module defines all error codes used across the order server and
//! its clients. Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product and inventory errors
//! - 9xxx: System errors
//!
//! Ranges 1xxx-3xxx and 7xxx-8xxx are reserved for future use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has no items
    OrderEmpty = 4002,
    /// Order has already been cancelled
    OrderAlreadyCancelled = 4003,
    /// Order has already been delivered
    OrderAlreadyDelivered = 4004,
    /// Order has already been returned
    OrderAlreadyReturned = 4005,
    /// Command has already been processed
    DuplicateCommand = 4007,
    /// Requested status transition is not allowed
    InvalidTransition = 4008,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Payment has already been settled
    PaymentAlreadySettled = 5002,
    /// Invalid payment method
    PaymentInvalidMethod = 5003,
    /// Payment has not been initiated for this order
    PaymentNotInitiated = 5004,
    /// Gateway reference does not match the order
    PaymentRefMismatch = 5005,
    /// Payment callback signature does not match
    SignatureMismatch = 5006,
    /// Payment gateway is unreachable
    GatewayUnavailable = 5007,
    /// Payment gateway rejected the request
    GatewayRejected = 5008,

    // ==================== 6xxx: Product / Inventory ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product has invalid price
    ProductInvalidPrice = 6002,
    /// Not enough stock available
    InsufficientStock = 6003,
    /// Product is not purchasable
    ProductNotPurchasable = 6004,
    /// Invalid quantity
    InvalidQuantity = 6005,
    /// Reservation not found
    ReservationNotFound = 6101,
    /// Reservation has already been finalized
    ReservationAlreadyFinalized = 6102,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Out of memory
    OutOfMemory = 9402,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::OrderAlreadyCancelled => "Order has already been cancelled",
            ErrorCode::OrderAlreadyDelivered => "Order has already been delivered",
            ErrorCode::OrderAlreadyReturned => "Order has already been returned",
            ErrorCode::DuplicateCommand => "Command has already been processed",
            ErrorCode::InvalidTransition => "Status transition is not allowed",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentAlreadySettled => "Payment has already been settled",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::PaymentNotInitiated => "Payment has not been initiated",
            ErrorCode::PaymentRefMismatch => "Gateway reference does not match the order",
            ErrorCode::SignatureMismatch => "Payment signature verification failed",
            ErrorCode::GatewayUnavailable => "Payment gateway is unavailable",
            ErrorCode::GatewayRejected => "Payment gateway rejected the request",

            // Product / Inventory
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has invalid price",
            ErrorCode::InsufficientStock => "Not enough stock available",
            ErrorCode::ProductNotPurchasable => "Product is not purchasable",
            ErrorCode::InvalidQuantity => "Invalid quantity",
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::ReservationAlreadyFinalized => "Reservation has already been finalized",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",

            // Storage
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::OrderAlreadyCancelled),
            4004 => Ok(ErrorCode::OrderAlreadyDelivered),
            4005 => Ok(ErrorCode::OrderAlreadyReturned),
            4007 => Ok(ErrorCode::DuplicateCommand),
            4008 => Ok(ErrorCode::InvalidTransition),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentAlreadySettled),
            5003 => Ok(ErrorCode::PaymentInvalidMethod),
            5004 => Ok(ErrorCode::PaymentNotInitiated),
            5005 => Ok(ErrorCode::PaymentRefMismatch),
            5006 => Ok(ErrorCode::SignatureMismatch),
            5007 => Ok(ErrorCode::GatewayUnavailable),
            5008 => Ok(ErrorCode::GatewayRejected),

            // Product / Inventory
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::ProductInvalidPrice),
            6003 => Ok(ErrorCode::InsufficientStock),
            6004 => Ok(ErrorCode::ProductNotPurchasable),
            6005 => Ok(ErrorCode::InvalidQuantity),
            6101 => Ok(ErrorCode::ReservationNotFound),
            6102 => Ok(ErrorCode::ReservationAlreadyFinalized),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            // Storage
            9401 => Ok(ErrorCode::StorageFull),
            9402 => Ok(ErrorCode::OutOfMemory),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
