//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Sku, Money, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

/// Catalog product. `price` is always held in the store's base currency;
/// other currencies are derived at display time.
#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: Sku,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub inventory: Quantity,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value { "draft" => Some(Self::Draft), "active" => Some(Self::Active), "archived" => Some(Self::Archived), _ => None }
    }
}

/// Highest accepted unit price (10^12), well inside the `NUMERIC(20, 4)` column.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

impl Product {
    /// Rejects prices that are negative or above [`MAX_PRICE`].
    pub fn check_price(price: Decimal) -> Result<(), ProductError> {
        if price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        if price > MAX_PRICE { return Err(ProductError::PriceTooLarge); }
        Ok(())
    }

    pub fn create(sku: Sku, name: impl Into<String>, price: Money) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut product = Self {
            id, sku: sku.clone(), name: name.into(), description: None,
            price, inventory: Quantity::default(), status: ProductStatus::Draft,
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku }));
        product
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn is_in_stock(&self) -> bool { !self.inventory.is_zero() }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.name = name;
        self.touch();
        Ok(())
    }

    pub fn describe(&mut self, description: Option<String>) { self.description = description; self.touch(); }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.status != ProductStatus::Active {
            self.status = ProductStatus::Active;
            self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        }
        self.touch();
        Ok(())
    }

    pub fn unpublish(&mut self) { self.status = ProductStatus::Draft; self.touch(); }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn update_price(&mut self, new_price: Money) -> Result<(), ProductError> {
        Self::check_price(new_price.amount())?;
        if new_price != self.price {
            self.raise_event(DomainEvent::Product(ProductEvent::PriceChanged { product_id: self.id, price: new_price.amount() }));
            self.price = new_price;
        }
        self.touch();
        Ok(())
    }

    pub fn add_inventory(&mut self, qty: u32) {
        self.inventory = self.inventory.add(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryAdded { product_id: self.id, quantity: qty }));
    }

    pub fn remove_inventory(&mut self, qty: u32) -> Result<(), ProductError> {
        self.inventory = self.inventory.subtract(qty).ok_or(ProductError::InsufficientInventory)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryRemoved { product_id: self.id, quantity: qty }));
        Ok(())
    }

    /// Sets stock to an absolute level, recording the difference.
    pub fn set_inventory(&mut self, qty: u32) {
        let current = self.inventory.value();
        if qty > current {
            self.add_inventory(qty - current);
        } else if qty < current {
            self.inventory = Quantity::new(qty);
            self.touch();
            self.raise_event(DomainEvent::Product(ProductEvent::InventoryRemoved { product_id: self.id, quantity: current - qty }));
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone)] pub enum ProductError { MissingName, NegativePrice, PriceTooLarge, InsufficientInventory }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::NegativePrice => write!(f, "Price must not be negative"),
            Self::PriceTooLarge => write!(f, "Price must not exceed {MAX_PRICE}"),
            Self::InsufficientInventory => write!(f, "Insufficient inventory"),
        }
    }
}
