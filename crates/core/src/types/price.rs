//! Money parsing, rounding, and display.
//!
//! The storefront API returns amounts either as decimal strings (`"12.50"`)
//! or as JSON numbers, and older product records carry display strings such
//! as `"$12.50"`. Amounts are kept as the raw string on the wire types and
//! coerced to [`Decimal`] only when arithmetic is needed.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// Parse a monetary amount leniently.
///
/// Every character other than ASCII digits, `.` and `-` is stripped before
/// parsing. Anything that still fails to parse yields zero; this function
/// never errors.
///
/// ```
/// use agroshop_core::types::price::parse_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_amount("$1,299.50"), Decimal::new(129_950, 2));
/// assert_eq!(parse_amount("n/a"), Decimal::ZERO);
/// ```
#[must_use]
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    cleaned.parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

/// Round to two decimal places, midpoint away from zero.
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount with exactly two decimals (`"12.50"`).
///
/// This is the single formatting rule for every amount shown to the user,
/// totals included.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = round2(amount);
    rounded.rescale(2);
    rounded.to_string()
}

/// Deserialize an amount that may arrive as a string, a number, or null.
///
/// The raw representation is preserved as a string; `null` becomes `"0"`.
///
/// # Errors
///
/// Returns an error only for JSON values that are neither strings, numbers
/// nor null.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Number(serde_json::Number),
        Missing(()),
    }

    Ok(match RawAmount::deserialize(deserializer)? {
        RawAmount::Text(s) => s,
        RawAmount::Number(n) => n.to_string(),
        RawAmount::Missing(()) => "0".to_string(),
    })
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., shillings, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Format for display (e.g., `"KES 1299.50"`, `"$5.00"`).
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}{}",
            self.currency_code.symbol(),
            format_amount(self.amount)
        )
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes supported by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    /// Kenyan shilling, the mobile-money settlement currency.
    #[default]
    KES,
    USD,
}

impl CurrencyCode {
    /// Display prefix for amounts in this currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::KES => "KES ",
            Self::USD => "$",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KES" => Ok(Self::KES),
            "USD" => Ok(Self::USD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount("12.50"), Decimal::new(1250, 2));
        assert_eq!(parse_amount("7"), Decimal::new(7, 0));
    }

    #[test]
    fn test_parse_amount_strips_symbols() {
        assert_eq!(parse_amount("$19.99"), Decimal::new(1999, 2));
        assert_eq!(parse_amount("KES 1,000"), Decimal::new(1000, 0));
    }

    #[test]
    fn test_parse_amount_garbage_is_zero() {
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("free"), Decimal::ZERO);
        assert_eq!(parse_amount("1.2.3"), Decimal::ZERO);
        assert_eq!(parse_amount("--"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_amount_strips_exponent_letters() {
        assert_eq!(parse_amount("1e3"), Decimal::new(13, 0));
        assert_eq!(parse_amount("2.5E-1"), Decimal::ZERO);
    }

    #[test]
    fn test_round2_midpoint_away_from_zero() {
        assert_eq!(round2(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round2(Decimal::new(1015, 3)), Decimal::new(102, 2));
        assert_eq!(round2(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
    }

    #[test]
    fn test_format_amount_always_two_decimals() {
        assert_eq!(format_amount(Decimal::new(5, 0)), "5.00");
        assert_eq!(format_amount(Decimal::new(599, 2)), "5.99");
        assert_eq!(format_amount(Decimal::new(12_345, 3)), "12.35");
    }

    #[test]
    fn test_deserialize_amount_accepts_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Line {
            #[serde(deserialize_with = "deserialize_amount")]
            price: String,
        }

        let line: Line = serde_json::from_str(r#"{"price": "12.50"}"#).unwrap();
        assert_eq!(line.price, "12.50");

        let line: Line = serde_json::from_str(r#"{"price": 12.5}"#).unwrap();
        assert_eq!(parse_amount(&line.price), Decimal::new(125, 1));

        let line: Line = serde_json::from_str(r#"{"price": null}"#).unwrap();
        assert_eq!(line.price, "0");
    }

    #[test]
    fn test_price_display() {
        let price = Price::new(Decimal::new(1250, 2), CurrencyCode::KES);
        assert_eq!(price.to_string(), "KES 12.50");

        let price = Price::new(Decimal::new(5, 0), CurrencyCode::USD);
        assert_eq!(price.to_string(), "$5.00");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("kes".parse::<CurrencyCode>().unwrap(), CurrencyCode::KES);
        assert!("EUR".parse::<CurrencyCode>().is_err());
    }
}
