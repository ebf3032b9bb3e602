//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary arithmetic goes through `Decimal`; values are converted to
//! `f64` only at the storage/serialization edge, rounded to 2 decimal
//! places half-up.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01, exact in Decimal)
fn money_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Maximum allowed price per unit
pub const MAX_PRICE: f64 = 1_000_000.0;

/// Maximum allowed quantity per line item
pub const MAX_QUANTITY: i64 = 9999;

/// Round a decimal to 2 places, half-up
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an f64 amount (as stored) into a Decimal for arithmetic
///
/// Non-finite input maps to zero; callers validate amounts before this point.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Convert a Decimal back to the f64 storage representation (rounded)
pub fn to_f64(value: Decimal) -> f64 {
    round2(value).to_f64().unwrap_or(0.0)
}

/// line total = unit_price × quantity
pub fn line_total(unit_price: f64, quantity: i64) -> Decimal {
    round2(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Compare two stored amounts within the 0.01 tolerance
///
/// 在 Decimal 里比，f64 直接相减会把 30.0 和 30.01 判成超差。
pub fn amounts_equal(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() <= money_tolerance()
}

/// Convert a stored amount to gateway minor units (e.g. kobo)
pub fn to_minor_units(amount: f64) -> i64 {
    (to_decimal(amount) * Decimal::from(100))
        .round()
        .to_i64()
        .unwrap_or(0)
}

/// Convert gateway minor units back to a stored amount
pub fn from_minor_units(minor: i64) -> f64 {
    to_f64(Decimal::from(minor) / Decimal::from(100))
}
