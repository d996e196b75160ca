//! Type-safe price representation using decimal arithmetic.
//!
//! Upstream prices arrive as JSON floats. They are converted to
//! [`Decimal`] once, so rounding and grouping happen on exact values.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., pesos, not centavos).
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

    /// Create a price from an upstream float amount.
    ///
    /// Returns `None` for non-finite values and magnitudes beyond
    /// [`Decimal::MAX`].
    #[must_use]
    pub fn from_f64(amount: f64, currency_code: CurrencyCode) -> Option<Self> {
        Decimal::from_f64(amount).map(|amount| Self::new(amount, currency_code))
    }

    /// Apply an exchange rate, keeping the currency code.
    ///
    /// Returns `None` if the converted amount overflows.
    #[must_use]
    pub fn convert(self, rate: Decimal) -> Option<Self> {
        self.amount
            .checked_mul(rate)
            .map(|amount| Self::new(amount, self.currency_code))
    }

    /// Format for display: symbol, grouped amount with two decimals, code.
    ///
    /// ```
    /// use catalog_core::{CurrencyCode, Price};
    /// use rust_decimal::Decimal;
    ///
    /// let price = Price::new(Decimal::new(124_900, 2), CurrencyCode::MXN);
    /// assert_eq!(price.display(), "$1,249.00 MXN");
    /// ```
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        render(
            rounded.is_sign_negative() && !rounded.is_zero(),
            &format!("{:.2}", rounded.abs()),
            self.currency_code,
        )
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Render `digits` (unsigned, two decimals) with sign, symbol and code.
fn render(negative: bool, digits: &str, currency: CurrencyCode) -> String {
    let sign = if negative { "-" } else { "" };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    format!(
        "{sign}{}{}.{fraction} {}",
        currency.symbol(),
        group_thousands(whole),
        currency.code()
    )
}

/// Insert `,` separators every three digits from the right.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    MXN,
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Currency symbol used as a display prefix.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::MXN | Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MXN => "MXN",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MXN" => Ok(Self::MXN),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// How upstream prices are turned into display strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFormat {
    /// Currency the display string is rendered in.
    pub currency: CurrencyCode,
    /// Multiplier applied to the upstream amount before formatting.
    pub exchange_rate: Decimal,
}

/// Upstream USD to MXN multiplier used when none is configured.
pub const DEFAULT_EXCHANGE_RATE: Decimal = Decimal::from_parts(195, 0, 0, false, 1);

impl Default for PriceFormat {
    fn default() -> Self {
        Self::new(CurrencyCode::MXN, DEFAULT_EXCHANGE_RATE)
    }
}

impl PriceFormat {
    #[must_use]
    pub const fn new(currency: CurrencyCode, exchange_rate: Decimal) -> Self {
        Self {
            currency,
            exchange_rate,
        }
    }

    /// Format an upstream amount.
    ///
    /// Non-finite amounts render as zero. Amounts outside the decimal range,
    /// before or after conversion, are formatted from the float value.
    #[must_use]
    pub fn format(&self, amount: f64) -> String {
        if !amount.is_finite() {
            return Price::new(Decimal::ZERO, self.currency).display();
        }
        Price::from_f64(amount, self.currency)
            .and_then(|price| price.convert(self.exchange_rate))
            .map_or_else(|| self.format_float(amount), |price| price.display())
    }

    fn format_float(&self, amount: f64) -> String {
        let rate = self.exchange_rate.to_f64().unwrap_or(1.0);
        let converted = Some(amount * rate)
            .filter(|v| v.is_finite())
            .unwrap_or(amount);
        render(
            converted.is_sign_negative(),
            &format!("{:.2}", converted.abs()),
            self.currency,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_small_amount() {
        let price = Price::new(Decimal::new(549, 0), CurrencyCode::MXN);
        assert_eq!(price.display(), "$549.00 MXN");
    }

    #[test]
    fn test_display_groups_thousands() {
        let price = Price::new(Decimal::new(123_456_789, 2), CurrencyCode::USD);
        assert_eq!(price.display(), "$1,234,567.89 USD");
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        let price = Price::new(Decimal::new(9_995, 3), CurrencyCode::EUR);
        assert_eq!(price.display(), "€10.00 EUR");
    }

    #[test]
    fn test_display_negative() {
        let price = Price::new(Decimal::new(-1_500, 2), CurrencyCode::GBP);
        assert_eq!(price.display(), "-£15.00 GBP");
    }

    #[test]
    fn test_group_thousands_boundaries() {
        assert_eq!(group_thousands("0"), "0");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("100000"), "100,000");
    }

    #[test]
    fn test_price_format_default_rate() {
        let format = PriceFormat::default();
        assert_eq!(format.exchange_rate, Decimal::new(195, 1));
        assert_eq!(format.format(549.0), "$10,705.50 MXN");
        assert_eq!(format.format(10.0), "$195.00 MXN");
    }

    #[test]
    fn test_price_format_float_input() {
        let format = PriceFormat::new(CurrencyCode::MXN, Decimal::ONE);
        assert_eq!(format.format(9.99), "$9.99 MXN");
    }

    #[test]
    fn test_convert_overflow() {
        let price = Price::new(Decimal::MAX, CurrencyCode::USD);
        assert_eq!(price.convert(Decimal::new(2, 0)), None);
        assert_eq!(price.convert(Decimal::ONE), Some(price));
    }

    #[test]
    fn test_price_format_overflowing_conversion() {
        let formatted = PriceFormat::default().format(7.0e27);

        assert!(formatted.starts_with("$136,"), "{formatted}");
        assert!(formatted.ends_with(".00 MXN"), "{formatted}");
    }

    #[test]
    fn test_price_format_beyond_decimal_range() {
        let format = PriceFormat::new(CurrencyCode::MXN, Decimal::ONE);
        let formatted = format.format(1.0e30);

        assert!(formatted.starts_with("$1,000,000,000,000,000,"), "{formatted}");
        assert!(formatted.ends_with(".00 MXN"), "{formatted}");

        let negative = format.format(-1.0e30);
        assert!(negative.starts_with("-$1,000,"), "{negative}");
    }

    #[test]
    fn test_price_format_non_finite() {
        assert_eq!(PriceFormat::default().format(f64::NAN), "$0.00 MXN");
    }

    #[test]
    fn test_currency_code_from_str() {
        assert_eq!("mxn".parse::<CurrencyCode>(), Ok(CurrencyCode::MXN));
        assert_eq!(" EUR ".parse::<CurrencyCode>(), Ok(CurrencyCode::EUR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
