//! Promo code aggregate
//!
//! A promo carries an inline, ordered set of product ids it is scoped to; an
//! empty set means the promo applies to every product. Keeping a product in at
//! most one active promo is the associator's job
//! (see `services::promo_associator`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage off eligible lines, `0 < p <= 100`.
    Percentage(Decimal),
    /// Fixed amount in the base currency, capped at the eligible subtotal.
    Fixed(Decimal),
}

impl Discount {
    pub fn kind(&self) -> &'static str {
        match self { Self::Percentage(_) => "percentage", Self::Fixed(_) => "fixed" }
    }

    pub fn value(&self) -> Decimal {
        match self { Self::Percentage(v) | Self::Fixed(v) => *v }
    }

    pub fn from_parts(kind: &str, value: Decimal) -> Result<Self, PromoError> {
        let discount = match kind {
            "percentage" => Self::Percentage(value),
            "fixed" => Self::Fixed(value),
            other => return Err(PromoError::InvalidDiscount(format!("unknown discount type {other}"))),
        };
        discount.validate()?;
        Ok(discount)
    }

    pub fn validate(&self) -> Result<(), PromoError> {
        match *self {
            Self::Percentage(p) if p <= Decimal::ZERO || p > Decimal::ONE_HUNDRED => {
                Err(PromoError::InvalidDiscount(format!("percentage {p} outside (0, 100]")))
            }
            Self::Fixed(v) if v <= Decimal::ZERO => Err(PromoError::InvalidDiscount(format!("fixed amount {v} must be positive"))),
            _ => Ok(()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromoError {
    #[error("Promo code must not be empty")]
    EmptyCode,

    #[error("Unknown promo code: {0}")]
    UnknownCode(String),

    #[error("Promo code {0} is not active")]
    Inactive(String),

    #[error("Promo code {0} is not valid yet")]
    NotStarted(String),

    #[error("Promo code {0} has expired")]
    Expired(String),

    #[error("Promo code {0} has reached its usage limit")]
    Exhausted(String),

    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),

    #[error("Promo validity window ends before it starts")]
    InvalidWindow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub product_ids: Vec<Uuid>,
    pub is_active: bool,
    pub discount: Discount,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    pub times_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoCode {
    pub fn create(code: &str, discount: Discount) -> Result<Self, PromoError> {
        discount.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            code: Self::normalize(code)?,
            product_ids: vec![],
            is_active: true,
            discount,
            starts_at: None,
            expires_at: None,
            max_uses: None,
            times_used: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Codes are stored trimmed and upper-cased.
    pub fn normalize(code: &str) -> Result<String, PromoError> {
        let code = code.trim();
        if code.is_empty() { return Err(PromoError::EmptyCode); }
        Ok(code.to_uppercase())
    }

    pub fn set_window(&mut self, starts_at: Option<DateTime<Utc>>, expires_at: Option<DateTime<Utc>>) -> Result<(), PromoError> {
        if let (Some(start), Some(end)) = (starts_at, expires_at) {
            if end <= start { return Err(PromoError::InvalidWindow); }
        }
        self.starts_at = starts_at;
        self.expires_at = expires_at;
        self.touch();
        Ok(())
    }

    /// Compares against the normalized form, so `café` finds `CAFÉ`.
    pub fn matches(&self, code: &str) -> bool { Self::normalize(code).is_ok_and(|c| c == self.code) }

    pub fn contains_product(&self, product_id: Uuid) -> bool { self.product_ids.contains(&product_id) }

    /// Whether the discount covers `product_id`. An empty product list covers everything.
    pub fn applies_to(&self, product_id: Uuid) -> bool {
        self.product_ids.is_empty() || self.contains_product(product_id)
    }

    /// Removes `product_id`, returning the position it held.
    pub fn detach_product(&mut self, product_id: Uuid) -> Option<usize> {
        let position = self.product_ids.iter().position(|id| *id == product_id)?;
        self.product_ids.remove(position);
        self.touch();
        Some(position)
    }

    /// Inserts `product_id` at `position` (or the end) unless already present.
    pub fn attach_product(&mut self, product_id: Uuid, position: Option<usize>) -> bool {
        if self.contains_product(product_id) { return false; }
        let at = position.unwrap_or(self.product_ids.len()).min(self.product_ids.len());
        self.product_ids.insert(at, product_id);
        self.touch();
        true
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), PromoError> {
        if !self.is_active { return Err(PromoError::Inactive(self.code.clone())); }
        if self.starts_at.is_some_and(|start| now < start) { return Err(PromoError::NotStarted(self.code.clone())); }
        if self.expires_at.is_some_and(|end| now >= end) { return Err(PromoError::Expired(self.code.clone())); }
        if self.max_uses.is_some_and(|max| self.times_used >= max) { return Err(PromoError::Exhausted(self.code.clone())); }
        Ok(())
    }

    pub fn record_use(&mut self) { self.times_used = self.times_used.saturating_add(1); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
