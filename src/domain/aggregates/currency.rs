//! Currency rate record

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::services::currency_converter::{normalize_code, CurrencyError};

/// A currency the store prices in, with its rate against the base currency.
/// Rows are deactivated rather than deleted; orders snapshot their own rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub code: String,
    pub rate: Decimal,
    pub symbol: String,
    pub is_active: bool,
}

impl CurrencyRate {
    pub fn new(code: &str, rate: Decimal, symbol: impl Into<String>) -> Result<Self, CurrencyError> {
        let code = normalize_code(code)?;
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidRate { code, rate });
        }
        Ok(Self { code, rate, symbol: symbol.into(), is_active: true })
    }

    pub fn is_base(&self) -> bool { self.rate == Decimal::ONE }

    /// Checks a row against the store's base currency: the base must stay
    /// active at rate 1.
    pub fn check_against_base(&self, base_currency: &str) -> Result<(), CurrencyError> {
        if self.code.eq_ignore_ascii_case(base_currency) && (!self.is_base() || !self.is_active) {
            return Err(CurrencyError::InvalidRate { code: self.code.clone(), rate: self.rate });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_normalizes_code() {
        let c = CurrencyRate::new("ngn", dec!(1650), "₦").unwrap();
        assert_eq!(c.code, "NGN");
        assert!(c.is_active);
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(CurrencyRate::new("GBP", dec!(0), "£").is_err());
        assert!(CurrencyRate::new("GBP", dec!(-1), "£").is_err());
    }

    #[test]
    fn test_base_currency_must_keep_rate_one() {
        let usd = CurrencyRate::new("USD", dec!(1.1), "$").unwrap();
        assert!(usd.check_against_base("USD").is_err());
        let mut usd = CurrencyRate::new("USD", dec!(1), "$").unwrap();
        assert!(usd.check_against_base("USD").is_ok());
        usd.is_active = false;
        assert!(usd.check_against_base("USD").is_err());
        let gbp = CurrencyRate::new("GBP", dec!(0.79), "£").unwrap();
        assert!(gbp.check_against_base("USD").is_ok());
    }
}
