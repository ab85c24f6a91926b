//! Fixed-point price utilities.
//!
//! ## Overview
//!
//! Prices in the simulator use fixed-point representation: values are stored
//! as u64 scaled by 10^8. Matching compares and copies prices as integers,
//! so clearing is exact and identical on every platform.
//!
//! Agent cash is a [`Decimal`]; the notional of a fill is computed by
//! converting the fixed-point price back to a decimal, never through floats.
//!
//! Agents quote in cents, and every printed price (transaction log, order log)
//! is rounded to two decimals.
//!
//! ## Examples
//!
//! ```
//! use market_sim::types::price::{to_fixed, from_fixed, format_2dp};
//!
//! let price = to_fixed("3.5").unwrap();
//! assert_eq!(price, 350_000_000);
//! assert_eq!(from_fixed(price), "3.50000000");
//! assert_eq!(format_2dp(price), "3.50");
//! ```

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Scaling factor for fixed-point arithmetic: 10^8
pub const SCALE: u64 = 100_000_000;

/// Fixed-point units per cent
pub const CENT: u64 = SCALE / 100;

/// Maximum whole-unit value that can be represented
///
/// u64::MAX / SCALE ≈ 184,467,440,737
pub const MAX_VALUE: u64 = u64::MAX / SCALE;

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert a decimal string to fixed-point u64
///
/// # Returns
///
/// * `Some(u64)` - The fixed-point representation
/// * `None` - If parsing fails or value is negative / out of range
///
/// # Example
///
/// ```
/// use market_sim::types::price::to_fixed;
///
/// assert_eq!(to_fixed("1.0"), Some(100_000_000));
/// assert_eq!(to_fixed("2.50"), Some(250_000_000));
/// assert_eq!(to_fixed("-1"), None);
/// ```
pub fn to_fixed(s: &str) -> Option<u64> {
    let decimal = Decimal::from_str(s.trim()).ok()?;
    decimal_to_fixed(decimal)
}

/// Convert a Decimal to fixed-point u64
///
/// Digits beyond the 8th decimal are rounded. Negative values are rejected.
pub fn decimal_to_fixed(d: Decimal) -> Option<u64> {
    if d.is_sign_negative() {
        return None;
    }

    let scaled = d.checked_mul(Decimal::from(SCALE))?;
    scaled.round_dp(0).to_u64()
}

/// Convert fixed-point u64 to an exact Decimal
pub fn fixed_to_decimal(value: u64) -> Decimal {
    Decimal::from_i128_with_scale(value as i128, 8)
}

/// Convert a whole number of cents to fixed-point
pub fn cents_to_fixed(cents: u64) -> u64 {
    cents.saturating_mul(CENT)
}

/// Convert fixed-point to whole cents, rounding half away from zero
pub fn fixed_to_cents(value: u64) -> u64 {
    value / CENT + u64::from(value % CENT >= CENT / 2)
}

/// Convert fixed-point u64 to a string with 8 decimal places
///
/// ```
/// use market_sim::types::price::from_fixed;
///
/// assert_eq!(from_fixed(100_000_000), "1.00000000");
/// assert_eq!(from_fixed(1), "0.00000001");
/// ```
pub fn from_fixed(value: u64) -> String {
    format!("{:.8}", fixed_to_decimal(value))
}

/// Render a fixed-point price the way output records print it: two decimals,
/// midpoint rounded away from zero.
///
/// ```
/// use market_sim::types::price::format_2dp;
///
/// assert_eq!(format_2dp(350_000_000), "3.50");
/// assert_eq!(format_2dp(1_005_000), "0.01");
/// ```
pub fn format_2dp(value: u64) -> String {
    format_decimal_2dp(fixed_to_decimal(value))
}

/// Two-decimal rendering of an arbitrary decimal amount (cash, notional)
pub fn format_decimal_2dp(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Exact cash value of `quantity` shares at a fixed-point `price`
pub fn notional(price: u64, quantity: u64) -> Decimal {
    fixed_to_decimal(price) * Decimal::from(quantity)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale_constants() {
        assert_eq!(SCALE, 100_000_000);
        assert_eq!(CENT, 1_000_000);
    }

    #[test]
    fn test_to_fixed_basic() {
        assert_eq!(to_fixed("1"), Some(100_000_000));
        assert_eq!(to_fixed("0.5"), Some(50_000_000));
        assert_eq!(to_fixed("0.00000001"), Some(1));
        assert_eq!(to_fixed(" 3.60 "), Some(360_000_000));
    }

    #[test]
    fn test_to_fixed_edge_cases() {
        assert_eq!(to_fixed("0"), Some(0));
        assert_eq!(to_fixed("-1.0"), None);
        assert_eq!(to_fixed("abc"), None);
        assert_eq!(to_fixed(""), None);
    }

    #[test]
    fn test_fixed_to_decimal_is_exact() {
        assert_eq!(fixed_to_decimal(350_000_000), dec!(3.5));
        assert_eq!(fixed_to_decimal(1), dec!(0.00000001));
        assert_eq!(fixed_to_decimal(0), Decimal::ZERO);
    }

    #[test]
    fn test_cents() {
        assert_eq!(cents_to_fixed(1), CENT);
        assert_eq!(cents_to_fixed(350), 350_000_000);
        assert_eq!(fixed_to_cents(350_000_000), 350);
        assert_eq!(fixed_to_cents(349_500_000), 350);
        assert_eq!(fixed_to_cents(349_400_000), 349);
        assert_eq!(fixed_to_cents(u64::MAX), u64::MAX / CENT + 1);
        assert_eq!(fixed_to_cents(u64::MAX - u64::MAX % CENT), u64::MAX / CENT);
    }

    #[test]
    fn test_format_2dp() {
        assert_eq!(format_2dp(350_000_000), "3.50");
        assert_eq!(format_2dp(250_000_000), "2.50");
        assert_eq!(format_2dp(100_000_000_000), "1000.00");
        assert_eq!(format_2dp(0), "0.00");
        // Midpoint rounds away from zero
        assert_eq!(format_2dp(1_234_500_000), "12.35");
        assert_eq!(format_2dp(1_234_499_999), "12.34");
    }

    #[test]
    fn test_format_decimal_2dp() {
        assert_eq!(format_decimal_2dp(dec!(9947.5)), "9947.50");
        assert_eq!(format_decimal_2dp(dec!(-52.5)), "-52.50");
    }

    #[test]
    fn test_notional() {
        assert_eq!(notional(350_000_000, 15), dec!(52.5));
        assert_eq!(notional(1, 3), dec!(0.00000003));
    }

    #[test]
    fn test_roundtrip() {
        for s in ["1.0", "0.5", "3.50", "0.00000001", "123456.78901234"] {
            let fixed = to_fixed(s).unwrap();
            let original = Decimal::from_str(s).unwrap();
            assert_eq!(fixed_to_decimal(fixed), original, "Roundtrip failed for {}", s);
        }
    }
}
