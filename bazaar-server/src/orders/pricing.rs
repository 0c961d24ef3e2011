//! Money calculation utilities using rust_decimal for precision
//!
//! All arithmetic is done on `Decimal` internally and converted back to
//! `f64` for storage and serialization. Prices enter the system only from
//! the catalog; this module turns resolved lines into an order's pricing
//! block and re-checks that block before it is accepted into an event.

use rust_decimal::prelude::*;

use shared::order::{OrderLine, OrderLineInput, Pricing};

use super::traits::OrderError;

/// Rounding: 2 decimal places, midpoint away from zero
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
const MAX_QUANTITY: i32 = 9999;

/// Pricing inputs resolved from configuration.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub currency: String,
    pub shipping_fee: f64,
    pub free_shipping_threshold: f64,
    pub tax_rate_percent: f64,
}

impl From<&crate::core::Config> for PricingConfig {
    fn from(config: &crate::core::Config) -> Self {
        Self {
            currency: config.currency.clone(),
            shipping_fee: config.shipping_fee,
            free_shipping_threshold: config.free_shipping_threshold,
            tax_rate_percent: config.tax_rate_percent,
        }
    }
}

/// Convert f64 to Decimal for precise arithmetic
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Convert Decimal back to f64 for storage
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Round an f64 amount to money precision
pub fn round_money(value: f64) -> f64 {
    to_f64(to_decimal(value))
}

/// Precise line total: unit price times quantity, rounded to money precision
pub fn line_total(unit_price: f64, quantity: i32) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Compare two amounts within [`MONEY_TOLERANCE`]
pub fn amounts_equal(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() <= MONEY_TOLERANCE
}

#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::InvalidAmount(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate a raw order line request before price resolution
pub fn validate_line_input(input: &OrderLineInput) -> Result<(), OrderError> {
    if input.product_id.trim().is_empty() {
        return Err(OrderError::InvalidOperation(
            "product_id must not be empty".to_string(),
        ));
    }
    if input.quantity <= 0 {
        return Err(OrderError::InvalidAmount(format!(
            "quantity must be positive, got {}",
            input.quantity
        )));
    }
    if input.quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidAmount(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, input.quantity
        )));
    }
    Ok(())
}

/// Validate a unit price coming from the catalog
pub fn validate_unit_price(price: f64) -> Result<(), OrderError> {
    require_finite(price, "price")?;
    if price < 0.0 {
        return Err(OrderError::InvalidAmount(format!(
            "price must be non-negative, got {}",
            price
        )));
    }
    if price > MAX_PRICE {
        return Err(OrderError::InvalidAmount(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, price
        )));
    }
    Ok(())
}

/// Compute the pricing block for a set of resolved lines.
///
/// Shipping is a flat fee waived once the subtotal reaches the free-shipping
/// threshold. Tax is a flat percentage of the subtotal. The total is
/// computed once here; appliers and handlers never re-derive it.
pub fn compute_pricing(lines: &[OrderLine], config: &PricingConfig) -> Pricing {
    let mut subtotal = Decimal::ZERO;
    for item in lines {
        subtotal += to_decimal(item.line_total);
    }

    let shipping = if subtotal >= to_decimal(config.free_shipping_threshold) {
        Decimal::ZERO
    } else {
        to_decimal(config.shipping_fee)
    };

    let tax = (subtotal * to_decimal(config.tax_rate_percent) / Decimal::from(100))
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);

    let discount = Decimal::ZERO;
    let total = subtotal + shipping + tax - discount;

    Pricing {
        subtotal: to_f64(subtotal),
        shipping: to_f64(shipping),
        tax: to_f64(tax),
        discount: to_f64(discount),
        total: to_f64(total),
        currency: config.currency.clone(),
    }
}

/// Re-check a pricing block for internal consistency.
///
/// Defends against a bug (or a tampered command) producing a total that
/// disagrees with its parts. Every check allows [`MONEY_TOLERANCE`].
pub fn validate_pricing(lines: &[OrderLine], pricing: &Pricing) -> Result<(), OrderError> {
    for item in lines {
        validate_unit_price(item.unit_price)?;
        require_finite(item.line_total, "line_total")?;
        if item.quantity <= 0 || item.quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidAmount(format!(
                "quantity out of range for product {}: {}",
                item.product_id, item.quantity
            )));
        }
        let expected = line_total(item.unit_price, item.quantity);
        if !amounts_equal(item.line_total, expected) {
            return Err(OrderError::InvalidAmount(format!(
                "line_total mismatch for product {}: got {}, expected {}",
                item.product_id, item.line_total, expected
            )));
        }
    }

    for (value, name) in [
        (pricing.subtotal, "subtotal"),
        (pricing.shipping, "shipping"),
        (pricing.tax, "tax"),
        (pricing.discount, "discount"),
        (pricing.total, "total"),
    ] {
        require_finite(value, name)?;
        if value < 0.0 {
            return Err(OrderError::InvalidAmount(format!(
                "{} must be non-negative, got {}",
                name, value
            )));
        }
    }

    let expected_subtotal: Decimal = lines.iter().map(|i| to_decimal(i.line_total)).sum();
    if !amounts_equal(pricing.subtotal, to_f64(expected_subtotal)) {
        return Err(OrderError::InvalidAmount(format!(
            "subtotal mismatch: got {}, expected {}",
            pricing.subtotal,
            to_f64(expected_subtotal)
        )));
    }

    let expected_total = to_decimal(pricing.subtotal) + to_decimal(pricing.shipping)
        + to_decimal(pricing.tax)
        - to_decimal(pricing.discount);
    if !amounts_equal(pricing.total, to_f64(expected_total)) {
        return Err(OrderError::InvalidAmount(format!(
            "total mismatch: got {}, expected {}",
            pricing.total,
            to_f64(expected_total)
        )));
    }

    Ok(())
}
