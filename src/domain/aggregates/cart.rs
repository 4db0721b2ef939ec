//! Cart Aggregate
//!
//! A cart is assembled per request from the stored session lines, priced in
//! the shopper's currency. It is never persisted as a whole.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::promo::{Discount, PromoCode};
use crate::domain::services::currency_converter::RateTable;
use crate::domain::value_objects::{Money, MoneyError};

/// A stored cart row: what the shopper put in, without prices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub session_id: String,
    pub product_id: Uuid,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    session_id: String,
    currency: String,
    items: Vec<CartItem>,
    subtotal: Money,
    discount: Money,
    total: Money,
    promo: Option<AppliedPromo>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.unit_price.multiply(self.quantity) }
}

/// A promo resolved against the cart currency.
#[derive(Clone, Debug, Serialize)]
pub struct AppliedPromo {
    pub promo_id: Uuid,
    pub code: String,
    pub discount: AppliedDiscount,
    #[serde(skip)]
    product_ids: Vec<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AppliedDiscount {
    Percentage(Decimal),
    Fixed(Money),
}

impl AppliedPromo {
    fn applies_to(&self, product_id: Uuid) -> bool {
        self.product_ids.is_empty() || self.product_ids.contains(&product_id)
    }
}

impl Cart {
    pub fn new(session_id: impl Into<String>, currency: &str) -> Self {
        Self {
            session_id: session_id.into(), currency: currency.to_ascii_uppercase(),
            items: vec![], subtotal: Money::zero(currency), discount: Money::zero(currency),
            total: Money::zero(currency), promo: None, updated_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn total(&self) -> &Money { &self.total }
    pub fn promo(&self) -> Option<&AppliedPromo> { self.promo.as_ref() }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds an item priced in the cart currency, merging with an existing line
    /// for the same product.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        let previous = self.items.clone();
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.checked_add(item.quantity).ok_or(CartError::AmountTooLarge)?;
        } else {
            self.items.push(item);
        }
        if let Err(e) = self.recalculate() {
            self.items = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let previous = self.items.clone();
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.items.retain(|i| i.product_id != product_id); }
        else { item.quantity = quantity; }
        if let Err(e) = self.recalculate() {
            self.items = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.recalculate()
    }

    /// Applies `promo` if it is redeemable at `now`. A fixed discount, held in
    /// `base_currency`, is converted into the cart currency first.
    pub fn apply_promo(&mut self, promo: &PromoCode, now: DateTime<Utc>, rates: &RateTable, base_currency: &str) -> crate::Result<()> {
        promo.check_redeemable(now)?;
        let discount = match promo.discount {
            Discount::Percentage(p) => AppliedDiscount::Percentage(p),
            Discount::Fixed(amount) => AppliedDiscount::Fixed(Money::new(amount, base_currency).convert_to(&self.currency, rates)?.rounded()),
        };
        let previous = self.promo.replace(AppliedPromo { promo_id: promo.id, code: promo.code.clone(), discount, product_ids: promo.product_ids.clone() });
        if let Err(e) = self.recalculate() {
            self.promo = previous;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn remove_promo(&mut self) -> Result<(), CartError> { self.promo = None; self.recalculate() }

    fn sum<'a>(&self, items: impl Iterator<Item = &'a CartItem>) -> Result<Money, MoneyError> {
        items.map(CartItem::line_total).try_fold(Money::zero(&self.currency), |acc, line| acc.add(&line?))
    }

    /// Recomputes the totals. Fails without touching them when an amount
    /// leaves the `Decimal` range.
    fn recalculate(&mut self) -> Result<(), CartError> {
        let subtotal = self.sum(self.items.iter())?;
        let discount = match &self.promo {
            None => Money::zero(&self.currency),
            Some(promo) => {
                let eligible = self.sum(self.items.iter().filter(|i| promo.applies_to(i.product_id)))?;
                let raw = match &promo.discount {
                    AppliedDiscount::Percentage(p) => eligible.percent(*p)?.rounded(),
                    AppliedDiscount::Fixed(m) => m.clone(),
                };
                Money::new(raw.amount().min(eligible.amount()), &self.currency)
            }
        };
        self.total = subtotal.subtract(&discount)?;
        self.subtotal = subtotal;
        self.discount = discount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, InvalidQuantity, CurrencyMismatch, AmountTooLarge }

impl From<MoneyError> for CartError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::CurrencyMismatch => Self::CurrencyMismatch,
            MoneyError::Overflow => Self::AmountTooLarge,
        }
    }
}
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "Item not found"),
            Self::InvalidQuantity => write!(f, "Quantity must be positive"),
            Self::CurrencyMismatch => write!(f, "Item priced in a different currency than the cart"),
            Self::AmountTooLarge => write!(f, "Cart amount out of range"),
        }
    }
}
