//! Money amounts using decimal arithmetic.
//!
//! The shop sells in Romanian lei. Amounts are plain [`Decimal`] values in the
//! currency's standard unit; [`Price`] pairs an amount with its currency when
//! the currency has to travel with the number (emails, confirmation pages).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (lei, not bani).
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

    /// Create a price in lei.
    #[must_use]
    pub const fn ron(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::RON)
    }

    /// Format for display (e.g., "25.00 lei").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{:.2} {}", self.amount.round_dp(2), self.currency_code.symbol())
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes accepted by the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    RON,
    EUR,
}

impl CurrencyCode {
    /// Display symbol used after the amount.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::RON => "lei",
            Self::EUR => "€",
        }
    }
}

/// Format an amount in lei, or `"N/A"` when the amount is unknown.
#[must_use]
pub fn format_amount(amount: Option<Decimal>) -> String {
    amount.map_or_else(|| "N/A".to_owned(), |a| Price::ron(a).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rounds_to_two_places() {
        assert_eq!(Price::ron(Decimal::new(25, 0)).display(), "25.00 lei");
        assert_eq!(Price::ron(Decimal::new(19_999, 3)).display(), "20.00 lei");
    }

    #[test]
    fn test_format_amount_unknown() {
        assert_eq!(format_amount(None), "N/A");
        assert_eq!(format_amount(Some(Decimal::new(40, 0))), "40.00 lei");
    }
}
