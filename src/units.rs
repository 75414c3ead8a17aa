//! Unit Conversion Utilities
//!
//! The gateway speaks integer minor units ("nanotons" for TON) encoded as
//! decimal strings; users type display decimals. Conversions here are exact:
//! everything goes through `rust_decimal`, never through floats.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Decimal precision of TON
pub const TON_DECIMALS: u32 = 9;

/// Largest precision we accept for an asset
pub const MAX_DECIMALS: u32 = 18;

/// Amount parsing / conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("malformed amount: {0}")]
    Malformed(String),

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("amount has more than {0} fractional digits")]
    TooPrecise(u32),

    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// An asset and the number of decimals of its minor unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub decimals: u32,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals: decimals.min(MAX_DECIMALS),
        }
    }

    /// The base asset of the marketplace
    pub fn ton() -> Self {
        Self::new("TON", TON_DECIMALS)
    }

    /// 10^decimals as a decimal
    fn unit(&self) -> Decimal {
        Decimal::from(10u64.pow(self.decimals))
    }
}

impl Default for Asset {
    fn default() -> Self {
        Self::ton()
    }
}

/// Parse a user-typed display amount.
///
/// Accepts `digits[.digits]`, a leading dot (`.5`) and a trailing dot (`5.`).
/// Signs, exponents, separators and whitespace inside the number are rejected.
pub fn parse_amount(input: &str, asset: &Asset) -> Result<Decimal, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(AmountError::Malformed(s.to_string()));
    }

    if frac_part.len() as u32 > asset.decimals {
        return Err(AmountError::TooPrecise(asset.decimals));
    }

    let normalized = format!(
        "{}.{}",
        if int_part.is_empty() { "0" } else { int_part },
        if frac_part.is_empty() { "0" } else { frac_part }
    );

    let value = Decimal::from_str(&normalized)
        .map_err(|e| AmountError::Overflow(format!("{}: {}", s, e)))?;

    if value <= Decimal::ZERO {
        return Err(AmountError::NotPositive);
    }

    Ok(value.normalize())
}

/// Convert a display amount to the gateway's minor-unit string
pub fn to_minor_units(amount: Decimal, asset: &Asset) -> Result<String, AmountError> {
    if amount.is_sign_negative() {
        return Err(AmountError::NotPositive);
    }

    let scaled = amount
        .checked_mul(asset.unit())
        .ok_or_else(|| AmountError::Overflow(amount.to_string()))?
        .normalize();

    if scaled.scale() != 0 {
        return Err(AmountError::TooPrecise(asset.decimals));
    }

    Ok(scaled.mantissa().to_string())
}

/// Convert a minor-unit string from the gateway back to a display amount
pub fn from_minor_units(minor: &str, asset: &Asset) -> Result<Decimal, AmountError> {
    let s = minor.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::Malformed(s.to_string()));
    }

    let raw: i128 = s
        .parse()
        .map_err(|_| AmountError::Overflow(s.to_string()))?;

    Decimal::try_from_i128_with_scale(raw, asset.decimals)
        .map(|d| d.normalize())
        .map_err(|e| AmountError::Overflow(format!("{}: {}", s, e)))
}

/// Render an amount with its symbol, e.g. "0.5 TON"
pub fn format_amount(amount: Decimal, asset: &Asset) -> String {
    format!("{} {}", amount.normalize(), asset.symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        let ton = Asset::ton();
        assert_eq!(parse_amount("0.5", &ton), Ok(dec("0.5")));
        assert_eq!(parse_amount(".5", &ton), Ok(dec("0.5")));
        assert_eq!(parse_amount("5.", &ton), Ok(dec("5")));
        assert_eq!(parse_amount("  12 ", &ton), Ok(dec("12")));
        assert_eq!(parse_amount("", &ton), Err(AmountError::Empty));
        assert_eq!(parse_amount("0", &ton), Err(AmountError::NotPositive));
        assert_eq!(parse_amount("0.000", &ton), Err(AmountError::NotPositive));
        assert!(matches!(parse_amount("-1", &ton), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("1e5", &ton), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("1.2.3", &ton), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount(".", &ton), Err(AmountError::Malformed(_))));
        assert!(matches!(parse_amount("abc", &ton), Err(AmountError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        let ton = Asset::ton();
        assert_eq!(
            parse_amount("0.0000000001", &ton),
            Err(AmountError::TooPrecise(9))
        );
        assert!(parse_amount("0.000000001", &ton).is_ok());
    }

    #[test]
    fn test_minor_unit_round_trip_boundaries() {
        let ton = Asset::ton();
        for (display, minor) in [
            ("0.000000001", "1"),
            ("1", "1000000000"),
            ("1000000", "1000000000000000"),
        ] {
            let amount = dec(display);
            assert_eq!(to_minor_units(amount, &ton).unwrap(), minor);
            assert_eq!(from_minor_units(minor, &ton).unwrap(), amount);
        }
    }

    #[test]
    fn test_to_minor_units_rejects_sub_unit() {
        let ton = Asset::ton();
        assert_eq!(
            to_minor_units(dec("0.0000000001"), &ton),
            Err(AmountError::TooPrecise(9))
        );
    }

    #[test]
    fn test_from_minor_units_rejects_garbage() {
        let ton = Asset::ton();
        assert!(matches!(from_minor_units("12a", &ton), Err(AmountError::Malformed(_))));
        assert!(matches!(from_minor_units("-5", &ton), Err(AmountError::Malformed(_))));
        assert_eq!(from_minor_units(" ", &ton), Err(AmountError::Empty));
    }

    #[test]
    fn test_other_precision() {
        let usdt = Asset::new("USDT", 6);
        assert_eq!(to_minor_units(dec("2.5"), &usdt).unwrap(), "2500000");
        assert_eq!(from_minor_units("2500000", &usdt).unwrap(), dec("2.5"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("0.500"), &Asset::ton()), "0.5 TON");
    }
}
