//! In-memory repositories backing the unit and HTTP test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, CurrencyRate, Order, Product, ProductStatus, PromoCode};
use crate::domain::repositories::{CartRepository, CurrencyRepository, OrderRepository, Page, ProductRepository, PromoRepository};
use crate::{EcommerceError, Result};

#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<Vec<Product>>,
    promos: RwLock<Vec<PromoCode>>,
    currencies: RwLock<Vec<CurrencyRate>>,
    carts: RwLock<HashMap<String, Vec<CartLine>>>,
    orders: RwLock<Vec<Order>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn paginate<T: Clone>(items: &[T], page: Page) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let data = items.iter().skip(page.offset() as usize).take(page.per_page as usize).cloned().collect();
    (data, total)
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64)> {
        let products = self.products.read().await;
        let visible: Vec<Product> = products.iter().rev().filter(|p| p.status != ProductStatus::Archived).cloned().collect();
        Ok(paginate(&visible, page))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.sku == product.sku) {
            return Err(EcommerceError::Conflict(format!("SKU {} already exists", product.sku)));
        }
        products.push(stored(product));
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut products = self.products.write().await;
        let slot = products.iter_mut().find(|p| p.id == product.id).ok_or(EcommerceError::ProductNotFound)?;
        *slot = stored(product);
        Ok(())
    }
}

/// Pending events stay with the caller, never in storage.
fn stored(product: &Product) -> Product {
    let mut copy = product.clone();
    copy.events.clear();
    copy
}

#[async_trait]
impl PromoRepository for InMemoryStore {
    async fn list_promos(&self) -> Result<Vec<PromoCode>> { Ok(self.promos.read().await.clone()) }

    async fn get_promo(&self, id: Uuid) -> Result<Option<PromoCode>> {
        Ok(self.promos.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn find_promo_by_code(&self, code: &str) -> Result<Option<PromoCode>> {
        Ok(self.promos.read().await.iter().find(|p| p.matches(code)).cloned())
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        let mut promos = self.promos.write().await;
        if promos.iter().any(|p| p.matches(&promo.code)) {
            return Err(EcommerceError::Conflict(format!("promo code {} already exists", promo.code)));
        }
        promos.push(promo.clone());
        Ok(())
    }

    async fn update_promo(&self, promo: &PromoCode) -> Result<()> {
        let mut promos = self.promos.write().await;
        let slot = promos.iter_mut().find(|p| p.id == promo.id).ok_or(EcommerceError::PromoNotFound)?;
        *slot = promo.clone();
        Ok(())
    }

    async fn delete_promo(&self, id: Uuid) -> Result<bool> {
        let mut promos = self.promos.write().await;
        let before = promos.len();
        promos.retain(|p| p.id != id);
        Ok(promos.len() != before)
    }

    async fn record_promo_use(&self, id: Uuid) -> Result<()> {
        let mut promos = self.promos.write().await;
        promos.iter_mut().find(|p| p.id == id).ok_or(EcommerceError::PromoNotFound)?.record_use();
        Ok(())
    }
}

#[async_trait]
impl CurrencyRepository for InMemoryStore {
    async fn list_currencies(&self) -> Result<Vec<CurrencyRate>> {
        let mut currencies = self.currencies.read().await.clone();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }

    async fn upsert_currency(&self, currency: &CurrencyRate) -> Result<()> {
        let mut currencies = self.currencies.write().await;
        match currencies.iter_mut().find(|c| c.code == currency.code) {
            Some(slot) => *slot = currency.clone(),
            None => currencies.push(currency.clone()),
        }
        Ok(())
    }

    async fn replace_currencies(&self, replacement: &[CurrencyRate]) -> Result<()> {
        let mut currencies = self.currencies.write().await;
        for currency in replacement {
            match currencies.iter_mut().find(|c| c.code == currency.code) {
                Some(slot) => *slot = currency.clone(),
                None => currencies.push(currency.clone()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn cart_lines(&self, session_id: &str) -> Result<Vec<CartLine>> {
        Ok(self.carts.read().await.get(session_id).cloned().unwrap_or_default())
    }

    async fn add_cart_line(&self, session_id: &str, product_id: Uuid, quantity: u32) -> Result<CartLine> {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(session_id.to_string()).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity += quantity;
            return Ok(line.clone());
        }
        let line = CartLine { session_id: session_id.to_string(), product_id, quantity, created_at: Utc::now() };
        lines.push(line.clone());
        Ok(line)
    }

    async fn remove_cart_line(&self, session_id: &str, product_id: Uuid) -> Result<bool> {
        let mut carts = self.carts.write().await;
        let Some(lines) = carts.get_mut(session_id) else { return Ok(false) };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() != before)
    }

    async fn clear_cart(&self, session_id: &str) -> Result<()> {
        self.carts.write().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list_orders(&self, page: Page) -> Result<(Vec<Order>, i64)> {
        let orders: Vec<Order> = self.orders.read().await.iter().rev().cloned().collect();
        Ok(paginate(&orders, page))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut copy = order.clone();
        copy.events.clear();
        self.orders.write().await.push(copy);
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let slot = orders.iter_mut().find(|o| o.id == order.id).ok_or(EcommerceError::OrderNotFound)?;
        *slot = order.clone();
        slot.events.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Discount;
    use crate::domain::value_objects::{Money, Sku};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_cart_lines_merge() {
        let store = InMemoryStore::new();
        let p = Uuid::new_v4();
        store.add_cart_line("s1", p, 1).await.unwrap();
        let line = store.add_cart_line("s1", p, 2).await.unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(store.cart_lines("s1").await.unwrap().len(), 1);
        assert!(store.remove_cart_line("s1", p).await.unwrap());
        assert!(!store.remove_cart_line("s2", p).await.unwrap());
    }

    #[tokio::test]
    async fn test_promo_code_unique_case_insensitive() {
        let store = InMemoryStore::new();
        store.insert_promo(&PromoCode::create("save5", Discount::Fixed(dec!(5))).unwrap()).await.unwrap();
        let dup = PromoCode::create("SAVE5", Discount::Fixed(dec!(5))).unwrap();
        assert!(matches!(store.insert_promo(&dup).await, Err(EcommerceError::Conflict(_))));
        assert!(store.find_promo_by_code("Save5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recording_use_keeps_concurrent_product_edits() {
        let store = InMemoryStore::new();
        let promo = PromoCode::create("SAVE5", Discount::Fixed(dec!(5))).unwrap();
        store.insert_promo(&promo).await.unwrap();
        let snapshot = store.get_promo(promo.id).await.unwrap().unwrap();

        let product = Uuid::new_v4();
        let mut edited = snapshot.clone();
        edited.attach_product(product, None);
        store.update_promo(&edited).await.unwrap();

        store.record_promo_use(snapshot.id).await.unwrap();
        let stored = store.get_promo(promo.id).await.unwrap().unwrap();
        assert_eq!(stored.times_used, 1);
        assert_eq!(stored.product_ids, vec![product]);
        assert!(matches!(store.record_promo_use(Uuid::new_v4()).await, Err(EcommerceError::PromoNotFound)));
    }

    #[tokio::test]
    async fn test_non_ascii_promo_code_lookup_and_uniqueness_agree() {
        let store = InMemoryStore::new();
        store.insert_promo(&PromoCode::create("café", Discount::Fixed(dec!(5))).unwrap()).await.unwrap();
        let found = store.find_promo_by_code("café").await.unwrap().unwrap();
        assert_eq!(found.code, "CAFÉ");
        assert!(store.find_promo_by_code("CAFé").await.unwrap().is_some());
        let dup = PromoCode::create("CAFé", Discount::Fixed(dec!(5))).unwrap();
        assert!(matches!(store.insert_promo(&dup).await, Err(EcommerceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_archived_products_hidden_from_listing() {
        let store = InMemoryStore::new();
        let mut p = Product::create(Sku::new("A").unwrap(), "A", Money::usd(dec!(1)));
        store.insert_product(&p).await.unwrap();
        p.archive();
        store.update_product(&p).await.unwrap();
        let (items, total) = store.list_products(Page::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
        assert!(store.get_product(p.id).await.unwrap().is_some());
    }
}
