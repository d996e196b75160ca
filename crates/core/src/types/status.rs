//! Stock availability derived from upstream inventory counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest stock count still reported as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Product availability shown to shoppers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
}

impl Availability {
    /// Derive availability from a stock count.
    ///
    /// `0` (or a negative count) is out of stock, `1..=5` is low stock and
    /// anything above is in stock.
    #[must_use]
    pub const fn from_stock(stock: i64) -> Self {
        if stock <= 0 {
            Self::OutOfStock
        } else if stock <= LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stock_thresholds() {
        assert_eq!(Availability::from_stock(0), Availability::OutOfStock);
        assert_eq!(Availability::from_stock(3), Availability::LowStock);
        assert_eq!(Availability::from_stock(50), Availability::InStock);
    }

    #[test]
    fn test_from_stock_boundaries() {
        assert_eq!(Availability::from_stock(1), Availability::LowStock);
        assert_eq!(Availability::from_stock(5), Availability::LowStock);
        assert_eq!(Availability::from_stock(6), Availability::InStock);
        assert_eq!(Availability::from_stock(-2), Availability::OutOfStock);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Availability::OutOfStock).unwrap();
        assert_eq!(json, "\"out_of_stock\"");

        let parsed: Availability = serde_json::from_str("\"low_stock\"").unwrap();
        assert_eq!(parsed, Availability::LowStock);
    }
}
