//! Persistence contracts. `infrastructure::postgres` backs them in production
//! and `infrastructure::memory` in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, CurrencyRate, Order, Product, PromoCode};
use crate::Result;

/// One page of a listing, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, 100) }
    }
    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

impl Default for Page { fn default() -> Self { Self::new(None, None) } }

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Non-archived products, newest first, with the total count.
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64)>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn update_product(&self, product: &Product) -> Result<()>;
}

#[async_trait]
pub trait PromoRepository: Send + Sync {
    async fn list_promos(&self) -> Result<Vec<PromoCode>>;
    async fn get_promo(&self, id: Uuid) -> Result<Option<PromoCode>>;
    /// Case-insensitive lookup.
    async fn find_promo_by_code(&self, code: &str) -> Result<Option<PromoCode>>;
    async fn insert_promo(&self, promo: &PromoCode) -> Result<()>;
    async fn update_promo(&self, promo: &PromoCode) -> Result<()>;
    async fn delete_promo(&self, id: Uuid) -> Result<bool>;
    /// Bumps `times_used` without touching the rest of the promo.
    async fn record_promo_use(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait CurrencyRepository: Send + Sync {
    async fn list_currencies(&self) -> Result<Vec<CurrencyRate>>;
    async fn upsert_currency(&self, currency: &CurrencyRate) -> Result<()>;
    /// Writes every row in one go; either all rows land or none do.
    async fn replace_currencies(&self, currencies: &[CurrencyRate]) -> Result<()>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn cart_lines(&self, session_id: &str) -> Result<Vec<CartLine>>;
    /// Adds `quantity` to the session's line for `product_id`, creating it if needed.
    async fn add_cart_line(&self, session_id: &str, product_id: Uuid, quantity: u32) -> Result<CartLine>;
    async fn remove_cart_line(&self, session_id: &str, product_id: Uuid) -> Result<bool>;
    async fn clear_cart(&self, session_id: &str) -> Result<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_orders(&self, page: Page) -> Result<(Vec<Order>, i64)>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn insert_order(&self, order: &Order) -> Result<()>;
    async fn update_order(&self, order: &Order) -> Result<()>;
}
