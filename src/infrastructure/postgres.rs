//! PostgreSQL repositories (sqlx). Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::{
    CartLine, CurrencyRate, Discount, FulfillmentStatus, Order, OrderLine, OrderStatus, PaymentStatus, Product,
    ProductStatus, PromoCode,
};
use crate::domain::repositories::{CartRepository, CurrencyRepository, OrderRepository, Page, ProductRepository, PromoRepository};
use crate::domain::value_objects::{Money, Quantity, Sku};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> EcommerceError {
    EcommerceError::StorageError(format!("corrupt {what}: {value}"))
}

fn to_u32(what: &str, value: i32) -> Result<u32> { u32::try_from(value).map_err(|_| corrupt(what, value)) }
fn to_i32(value: u32) -> Result<i32> { i32::try_from(value).map_err(|_| EcommerceError::Validation(format!("{value} is out of range"))) }

/// Maps unique-key violations to `Conflict`, everything else to storage errors.
fn write_error(err: sqlx::Error, conflict: impl FnOnce() -> String) -> EcommerceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => EcommerceError::Conflict(conflict()),
        _ => err.into(),
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, sku: String, name: String, description: Option<String>, price: Decimal, currency: String,
    inventory_quantity: i32, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = EcommerceError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id,
            sku: Sku::new(r.sku.as_str()).map_err(|_| corrupt("sku", &r.sku))?,
            name: r.name,
            description: r.description,
            price: Money::new(r.price, &r.currency),
            inventory: Quantity::new(to_u32("inventory", r.inventory_quantity)?),
            status: ProductStatus::parse(&r.status).ok_or_else(|| corrupt("product status", &r.status))?,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64)> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE status <> 'archived' ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status <> 'archived'").fetch_one(&self.pool).await?;
        let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>>>()?;
        Ok((products, total.0))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id)
            .fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, sku, name, description, price, currency, inventory_quantity, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(p.id).bind(p.sku.as_str()).bind(&p.name).bind(&p.description).bind(p.price.amount()).bind(p.price.currency())
            .bind(to_i32(p.inventory.value())?).bind(p.status.as_str()).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| write_error(e, || format!("SKU {} already exists", p.sku)))?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> Result<()> {
        let result = sqlx::query("UPDATE products SET sku = $2, name = $3, description = $4, price = $5, currency = $6, inventory_quantity = $7, status = $8, updated_at = $9 WHERE id = $1")
            .bind(p.id).bind(p.sku.as_str()).bind(&p.name).bind(&p.description).bind(p.price.amount()).bind(p.price.currency())
            .bind(to_i32(p.inventory.value())?).bind(p.status.as_str()).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| write_error(e, || format!("SKU {} already exists", p.sku)))?;
        if result.rows_affected() == 0 { return Err(EcommerceError::ProductNotFound); }
        Ok(())
    }
}

// =============================================================================
// Promo codes
// =============================================================================

#[derive(sqlx::FromRow)]
struct PromoRow {
    id: Uuid, code: String, product_ids: Vec<Uuid>, is_active: bool, discount_type: String, discount_value: Decimal,
    starts_at: Option<DateTime<Utc>>, expires_at: Option<DateTime<Utc>>, max_uses: Option<i32>, times_used: i32,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<PromoRow> for PromoCode {
    type Error = EcommerceError;
    fn try_from(r: PromoRow) -> Result<Self> {
        Ok(PromoCode {
            id: r.id,
            code: r.code,
            product_ids: r.product_ids,
            is_active: r.is_active,
            discount: Discount::from_parts(&r.discount_type, r.discount_value).map_err(|e| corrupt("discount", e))?,
            starts_at: r.starts_at,
            expires_at: r.expires_at,
            max_uses: r.max_uses.map(|m| to_u32("max_uses", m)).transpose()?,
            times_used: to_u32("times_used", r.times_used)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl PromoRepository for PgStore {
    async fn list_promos(&self) -> Result<Vec<PromoCode>> {
        sqlx::query_as::<_, PromoRow>("SELECT * FROM promo_codes ORDER BY created_at, id")
            .fetch_all(&self.pool).await?.into_iter().map(PromoCode::try_from).collect()
    }

    async fn get_promo(&self, id: Uuid) -> Result<Option<PromoCode>> {
        sqlx::query_as::<_, PromoRow>("SELECT * FROM promo_codes WHERE id = $1").bind(id)
            .fetch_optional(&self.pool).await?.map(PromoCode::try_from).transpose()
    }

    async fn find_promo_by_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let Ok(code) = PromoCode::normalize(code) else { return Ok(None) };
        sqlx::query_as::<_, PromoRow>("SELECT * FROM promo_codes WHERE code = $1").bind(code)
            .fetch_optional(&self.pool).await?.map(PromoCode::try_from).transpose()
    }

    async fn insert_promo(&self, p: &PromoCode) -> Result<()> {
        sqlx::query("INSERT INTO promo_codes (id, code, product_ids, is_active, discount_type, discount_value, starts_at, expires_at, max_uses, times_used, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)")
            .bind(p.id).bind(&p.code).bind(&p.product_ids).bind(p.is_active).bind(p.discount.kind()).bind(p.discount.value())
            .bind(p.starts_at).bind(p.expires_at).bind(p.max_uses.map(to_i32).transpose()?).bind(to_i32(p.times_used)?)
            .bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| write_error(e, || format!("promo code {} already exists", p.code)))?;
        Ok(())
    }

    async fn update_promo(&self, p: &PromoCode) -> Result<()> {
        let result = sqlx::query("UPDATE promo_codes SET code = $2, product_ids = $3, is_active = $4, discount_type = $5, discount_value = $6, starts_at = $7, expires_at = $8, max_uses = $9, times_used = $10, updated_at = $11 WHERE id = $1")
            .bind(p.id).bind(&p.code).bind(&p.product_ids).bind(p.is_active).bind(p.discount.kind()).bind(p.discount.value())
            .bind(p.starts_at).bind(p.expires_at).bind(p.max_uses.map(to_i32).transpose()?).bind(to_i32(p.times_used)?).bind(p.updated_at)
            .execute(&self.pool).await.map_err(|e| write_error(e, || format!("promo code {} already exists", p.code)))?;
        if result.rows_affected() == 0 { return Err(EcommerceError::PromoNotFound); }
        Ok(())
    }

    async fn delete_promo(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM promo_codes WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_promo_use(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE promo_codes SET times_used = times_used + 1, updated_at = NOW() WHERE id = $1")
            .bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(EcommerceError::PromoNotFound); }
        Ok(())
    }
}

// =============================================================================
// Currencies
// =============================================================================

#[derive(sqlx::FromRow)]
struct CurrencyRow { code: String, rate: Decimal, symbol: String, is_active: bool }

#[async_trait]
impl CurrencyRepository for PgStore {
    async fn list_currencies(&self) -> Result<Vec<CurrencyRate>> {
        let rows = sqlx::query_as::<_, CurrencyRow>("SELECT code, rate, symbol, is_active FROM currencies ORDER BY code")
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| CurrencyRate { code: r.code, rate: r.rate, symbol: r.symbol, is_active: r.is_active }).collect())
    }

    async fn upsert_currency(&self, c: &CurrencyRate) -> Result<()> {
        sqlx::query(UPSERT_CURRENCY).bind(&c.code).bind(c.rate).bind(&c.symbol).bind(c.is_active).execute(&self.pool).await?;
        Ok(())
    }

    async fn replace_currencies(&self, currencies: &[CurrencyRate]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for c in currencies {
            sqlx::query(UPSERT_CURRENCY).bind(&c.code).bind(c.rate).bind(&c.symbol).bind(c.is_active).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

const UPSERT_CURRENCY: &str = "INSERT INTO currencies (code, rate, symbol, is_active, updated_at) VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT (code) DO UPDATE SET rate = $2, symbol = $3, is_active = $4, updated_at = NOW()";

// =============================================================================
// Carts
// =============================================================================

#[derive(sqlx::FromRow)]
struct CartRow { session_id: String, product_id: Uuid, quantity: i32, created_at: DateTime<Utc> }

impl TryFrom<CartRow> for CartLine {
    type Error = EcommerceError;
    fn try_from(r: CartRow) -> Result<Self> {
        Ok(CartLine { session_id: r.session_id, product_id: r.product_id, quantity: to_u32("cart quantity", r.quantity)?, created_at: r.created_at })
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn cart_lines(&self, session_id: &str) -> Result<Vec<CartLine>> {
        sqlx::query_as::<_, CartRow>("SELECT session_id, product_id, quantity, created_at FROM cart_items WHERE session_id = $1 ORDER BY created_at")
            .bind(session_id).fetch_all(&self.pool).await?.into_iter().map(CartLine::try_from).collect()
    }

    async fn add_cart_line(&self, session_id: &str, product_id: Uuid, quantity: u32) -> Result<CartLine> {
        sqlx::query_as::<_, CartRow>("INSERT INTO cart_items (id, session_id, product_id, quantity, created_at) VALUES ($1, $2, $3, $4, NOW()) ON CONFLICT (session_id, product_id) DO UPDATE SET quantity = cart_items.quantity + $4 RETURNING session_id, product_id, quantity, created_at")
            .bind(Uuid::now_v7()).bind(session_id).bind(product_id).bind(to_i32(quantity)?)
            .fetch_one(&self.pool).await?.try_into()
    }

    async fn remove_cart_line(&self, session_id: &str, product_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2")
            .bind(session_id).bind(product_id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(session_id).execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, customer_email: String, status: String, payment_status: String, fulfillment_status: String,
    currency: String, exchange_rate: Decimal, subtotal: Decimal, discount: Decimal, total: Decimal, promo_code: Option<String>,
    shipping_address: serde_json::Value, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { order_id: Uuid, product_id: Uuid, sku: String, name: String, quantity: i32, unit_price: Decimal, total: Decimal }

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order> {
        let lines = items.into_iter().map(|i| Ok(OrderLine {
            product_id: i.product_id, sku: i.sku, name: i.name, quantity: to_u32("order quantity", i.quantity)?,
            unit_price: i.unit_price, total: i.total,
        })).collect::<Result<Vec<_>>>()?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_email: self.customer_email,
            status: OrderStatus::parse(&self.status).ok_or_else(|| corrupt("order status", &self.status))?,
            payment_status: PaymentStatus::parse(&self.payment_status).ok_or_else(|| corrupt("payment status", &self.payment_status))?,
            fulfillment_status: FulfillmentStatus::parse(&self.fulfillment_status).ok_or_else(|| corrupt("fulfillment status", &self.fulfillment_status))?,
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            subtotal: self.subtotal,
            discount: self.discount,
            total: self.total,
            promo_code: self.promo_code,
            lines,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: vec![],
        })
    }
}

impl PgStore {
    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = sqlx::query_as::<_, OrderItemRow>("SELECT order_id, product_id, sku, name, quantity, unit_price, total FROM order_items WHERE order_id = ANY($1) ORDER BY position")
            .bind(&ids).fetch_all(&self.pool).await?;
        rows.into_iter().map(|row| {
            let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut items).into_iter().partition(|i| i.order_id == row.id);
            items = rest;
            row.into_order(mine)
        }).collect()
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn list_orders(&self, page: Page) -> Result<(Vec<Order>, i64)> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit()).bind(page.offset()).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        Ok((self.hydrate_orders(rows).await?, total.0))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        Ok(self.hydrate_orders(vec![row]).await?.pop())
    }

    async fn insert_order(&self, o: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, order_number, customer_email, status, payment_status, fulfillment_status, currency, exchange_rate, subtotal, discount, total, promo_code, shipping_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)")
            .bind(o.id).bind(&o.order_number).bind(&o.customer_email).bind(o.status.as_str()).bind(o.payment_status.as_str())
            .bind(o.fulfillment_status.as_str()).bind(&o.currency).bind(o.exchange_rate).bind(o.subtotal).bind(o.discount)
            .bind(o.total).bind(&o.promo_code).bind(&o.shipping_address).bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await?;
        for (position, line) in o.lines.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, sku, name, quantity, unit_price, total, position) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
                .bind(Uuid::now_v7()).bind(o.id).bind(line.product_id).bind(&line.sku).bind(&line.name)
                .bind(to_i32(line.quantity)?).bind(line.unit_price).bind(line.total).bind(position as i32)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_order(&self, o: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, payment_status = $3, fulfillment_status = $4, updated_at = $5 WHERE id = $1")
            .bind(o.id).bind(o.status.as_str()).bind(o.payment_status.as_str()).bind(o.fulfillment_status.as_str()).bind(o.updated_at)
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(EcommerceError::OrderNotFound); }
        Ok(())
    }
}
