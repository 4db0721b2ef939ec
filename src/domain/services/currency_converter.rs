//! Base-currency normalized conversion.
//!
//! Every rate is stored relative to the base currency (rate 1). Converting
//! `amount` from `A` to `B` divides by `rate(A)` to reach base units and then
//! multiplies by `rate(B)`, so the table stays linear in the number of
//! currencies.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::aggregates::currency::CurrencyRate;
use crate::domain::repositories::CurrencyRepository;

/// Rates used wherever the live table is empty or lacks a requested code.
/// All pricing paths (catalog display, cart, checkout, conversion endpoint)
/// go through this one table.
pub const FALLBACK_RATES: [(&str, Decimal); 4] = [
    ("USD", Decimal::ONE),
    ("GBP", Decimal::from_parts(79, 0, 0, false, 2)),
    ("CAD", Decimal::from_parts(136, 0, 0, false, 2)),
    ("NGN", Decimal::from_parts(1650, 0, 0, false, 0)),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid rate {rate} for currency {code}")]
    InvalidRate { code: String, rate: Decimal },

    #[error("Invalid currency code: {0}")]
    InvalidCode(String),

    #[error("Conversion overflow")]
    Overflow,
}

/// Upper-cases and validates a three letter currency code.
pub fn normalize_code(code: &str) -> Result<String, CurrencyError> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CurrencyError::InvalidCode(code.to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

/// Currency code to base-relative rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<String, Decimal>,
}

impl RateTable {
    pub fn new() -> Self { Self::default() }

    pub fn fallback() -> Self {
        FALLBACK_RATES.iter().fold(Self::new(), |mut table, (code, rate)| {
            table.insert(code, *rate);
            table
        })
    }

    /// Builds the live table from stored currencies. Inactive rows are left out.
    pub fn from_currencies<'a>(currencies: impl IntoIterator<Item = &'a CurrencyRate>) -> Self {
        let mut table = Self::new();
        for currency in currencies.into_iter().filter(|c| c.is_active) {
            table.insert(&currency.code, currency.rate);
        }
        table
    }

    pub fn insert(&mut self, code: &str, rate: Decimal) {
        self.rates.insert(code.trim().to_ascii_uppercase(), rate);
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.rates.get(&code.trim().to_ascii_uppercase()).copied()
    }

    pub fn contains(&self, code: &str) -> bool { self.get(code).is_some() }
    pub fn is_empty(&self) -> bool { self.rates.is_empty() }
    pub fn len(&self) -> usize { self.rates.len() }
    pub fn codes(&self) -> impl Iterator<Item = &str> { self.rates.keys().map(String::as_str) }

    fn rate_for(&self, code: &str) -> Result<Decimal, CurrencyError> {
        let rate = self.get(code).ok_or_else(|| CurrencyError::UnknownCurrency(code.to_string()))?;
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidRate { code: code.to_string(), rate });
        }
        Ok(rate)
    }
}

/// Decimal places kept by stored rates (`NUMERIC(24, 10)`).
const RATE_SCALE: u32 = 10;

/// Re-expresses `currencies` against `base`, leaving the base row active at
/// rate 1. Returns `None` when no base row is stored or it already sits at 1.
pub fn rebase(currencies: &[CurrencyRate], base: &str) -> Result<Option<Vec<CurrencyRate>>, CurrencyError> {
    let Some(anchor) = currencies.iter().find(|c| c.code.eq_ignore_ascii_case(base)) else { return Ok(None) };
    if anchor.is_base() && anchor.is_active {
        return Ok(None);
    }
    if anchor.rate <= Decimal::ZERO {
        return Err(CurrencyError::InvalidRate { code: anchor.code.clone(), rate: anchor.rate });
    }

    let rebased = currencies.iter().map(|c| {
        if c.code == anchor.code {
            return Ok(CurrencyRate { rate: Decimal::ONE, is_active: true, ..c.clone() });
        }
        let rate = c.rate.checked_div(anchor.rate).ok_or(CurrencyError::Overflow)?.round_dp(RATE_SCALE);
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidRate { code: c.code.clone(), rate });
        }
        Ok(CurrencyRate { rate, ..c.clone() })
    });
    rebased.collect::<Result<Vec<_>, _>>().map(Some)
}

/// Rebases the stored rates onto `base` when they were written against another
/// reference, such as the seeded USD table under `BASE_CURRENCY=NGN`. Returns
/// whether anything was rewritten.
pub async fn align_stored_rates(currencies: &dyn CurrencyRepository, base: &str) -> crate::Result<bool> {
    let stored = currencies.list_currencies().await?;
    let Some(rebased) = rebase(&stored, base)? else { return Ok(false) };
    currencies.replace_currencies(&rebased).await?;
    info!(%base, currencies = rebased.len(), "stored rates rebased onto the base currency");
    Ok(true)
}

/// Converts `amount` from `from` to `to` through the base currency.
///
/// Both codes must be present in `rates` with strictly positive rates.
/// Converting a currency to itself returns `amount` untouched.
pub fn convert(amount: Decimal, from: &str, to: &str, rates: &RateTable) -> Result<Decimal, CurrencyError> {
    let from_rate = rates.rate_for(from)?;
    let to_rate = rates.rate_for(to)?;
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return Ok(amount);
    }
    amount
        .checked_div(from_rate)
        .and_then(|base| base.checked_mul(to_rate))
        .ok_or(CurrencyError::Overflow)
}

/// Converts with `rates`, retrying against [`FALLBACK_RATES`] when the live
/// table is missing a code or carries an unusable rate for it.
pub fn convert_with_fallback(amount: Decimal, from: &str, to: &str, rates: &RateTable) -> Result<Decimal, CurrencyError> {
    match convert(amount, from, to, rates) {
        Err(err @ (CurrencyError::UnknownCurrency(_) | CurrencyError::InvalidRate { .. })) => {
            warn!(%from, %to, error = %err, "live rate table unusable, using fallback rates");
            convert(amount, from, to, &RateTable::fallback())
        }
        result => result,
    }
}
