use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount `{0}` is not a number")]
    NotANumber(String),
}

/// Normalize a monetary value to 2 decimal places, rounding half away from zero.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    let half_cent = BigDecimal::from(5) / BigDecimal::from(1000);
    let shifted = if *value < BigDecimal::zero() {
        value - &half_cent
    } else {
        value + &half_cent
    };
    // with_scale truncates toward zero once the half cent has been applied.
    shifted.with_scale(2)
}

/// Render with exactly two fractional digits and a `.` separator, e.g. `142.90`.
pub fn format_two_decimals(value: &BigDecimal) -> String {
    let normalized = normalize_scale(value);
    let cents = (&normalized * BigDecimal::from(100)).with_scale(0);
    match cents.to_i64() {
        Some(c) => {
            let sign = if c < 0 { "-" } else { "" };
            let abs = c.unsigned_abs();
            format!("{sign}{}.{:02}", abs / 100, abs % 100)
        }
        None => normalized.to_string(),
    }
}

/// Parse an amount the way gateways and form totals hand them over: thousands
/// separators, currency symbols and whitespace are dropped, only digits, sign
/// and the decimal point survive.
pub fn parse_lenient(raw: &str) -> Result<BigDecimal, MoneyError> {
    let sanitized: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    BigDecimal::from_str(&sanitized).map_err(|_| {
        tracing::debug!(raw, "amount could not be parsed");
        MoneyError::NotANumber(raw.to_string())
    })
}

/// Compare two monetary values allowing a tolerance (in cents) after normalization.
pub fn nearly_equal(a: &BigDecimal, b: &BigDecimal, cents_tolerance: i64) -> bool {
    let diff = (normalize_scale(a) - normalize_scale(b)) * BigDecimal::from(100);
    diff.with_scale(0)
        .to_i64()
        .map(|cents| cents.abs() <= cents_tolerance)
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd)]
pub struct NormalizedMoney(BigDecimal);

impl NormalizedMoney {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    pub fn zero() -> Self {
        Self::new(BigDecimal::zero())
    }

    pub fn parse(raw: &str) -> Result<Self, MoneyError> {
        parse_lenient(raw).map(Self::new)
    }

    /// Build from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self::new(BigDecimal::from(cents) / BigDecimal::from(100))
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<BigDecimal> for NormalizedMoney {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for NormalizedMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_two_decimals(&self.0))
    }
}
