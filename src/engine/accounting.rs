//! Decimal-safe volume accounting
//!
//! Every quantity, price, balance, and volume figure moves through
//! rust_decimal. Binary floating point never touches a financial total.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// A malformed decimal value in a quantity, price, or balance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),
}

/// Parse a wire decimal string exactly, without rounding.
pub fn parse_decimal(value: &str) -> Result<Decimal, ValidationError> {
    Decimal::from_str(value.trim())
        .map_err(|_| ValidationError::InvalidDecimal(value.to_string()))
}

/// Empty or absent balances mean zero, the same as an explicit zero.
pub fn parse_balance(value: &str) -> Result<Decimal, ValidationError> {
    if value.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    parse_decimal(value)
}

/// Quote notional required to open one leg: qty × price.
pub fn required_notional(qty: &str, price: &str) -> Result<Decimal, ValidationError> {
    Ok(parse_decimal(qty)? * parse_decimal(price)?)
}

/// Round-trip notional estimate for one cycle: qty × price × 2.
/// Used when the exchange does not report the filled quote values.
pub fn round_trip_notional(qty: &str, price: &str) -> Result<Decimal, ValidationError> {
    Ok(parse_decimal(qty)? * parse_decimal(price)? * Decimal::TWO)
}

/// Cycle volume: the sum of both filled quote notionals when the
/// exchange reports them, otherwise the round-trip estimate at the
/// observed last price.
pub fn cycle_volume(
    buy_quote: &str,
    sell_quote: &str,
    qty: &str,
    last_price: &str,
) -> Result<Decimal, ValidationError> {
    let buy = parse_balance(buy_quote)?;
    let sell = parse_balance(sell_quote)?;
    if buy > Decimal::ZERO && sell > Decimal::ZERO {
        return Ok(buy + sell);
    }
    round_trip_notional(qty, last_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_exact() {
        assert_eq!(parse_decimal("0.1").unwrap(), dec!(0.1));
        assert_eq!(parse_decimal("65000.5").unwrap(), dec!(65000.5));
        assert_eq!(parse_decimal(" 42 ").unwrap(), dec!(42));
    }

    #[test]
    fn test_parse_decimal_invalid() {
        let err = parse_decimal("not-a-number").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDecimal("not-a-number".to_string())
        );
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn test_no_binary_float_representation_error() {
        // 0.1 + 0.2 must be exactly 0.3, never 0.30000000000000004
        let sum = parse_decimal("0.1").unwrap() + parse_decimal("0.2").unwrap();
        assert_eq!(sum, dec!(0.3));
    }

    #[test]
    fn test_parse_balance_empty_is_zero() {
        assert_eq!(parse_balance("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_balance("  ").unwrap(), Decimal::ZERO);
        assert_eq!(parse_balance("0").unwrap(), Decimal::ZERO);
        assert_eq!(parse_balance("12.5").unwrap(), dec!(12.5));
    }

    #[test]
    fn test_required_notional() {
        assert_eq!(required_notional("0.5", "100").unwrap(), dec!(50));
        assert_eq!(required_notional("0.1", "0.2").unwrap(), dec!(0.02));
    }

    #[test]
    fn test_round_trip_notional() {
        // qty=1, price=100 -> exactly 200
        assert_eq!(round_trip_notional("1", "100").unwrap(), dec!(200));
        assert_eq!(round_trip_notional("0.01", "65000.5").unwrap(), dec!(1300.01));
    }

    #[test]
    fn test_cycle_volume_prefers_filled_quotes() {
        // Both legs reported: exact sum, never the estimate
        assert_eq!(
            cycle_volume("99.5", "100.2", "1", "100").unwrap(),
            dec!(199.7)
        );
    }

    #[test]
    fn test_cycle_volume_falls_back_to_estimate() {
        assert_eq!(cycle_volume("0", "0", "1", "100").unwrap(), dec!(200));
        // One missing leg is not enough for an exact figure
        assert_eq!(cycle_volume("99.5", "0", "1", "100").unwrap(), dec!(200));
        assert_eq!(cycle_volume("", "100.2", "1", "100").unwrap(), dec!(200));
    }
}
