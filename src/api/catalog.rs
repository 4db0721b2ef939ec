//! Product catalog handlers. Every create/update runs the promo associator so
//! the product ends up in at most one active promo.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::{AppState, ListParams, PaginatedResponse};
use crate::domain::aggregates::{Product, ProductStatus};
use crate::domain::repositories::Page;
use crate::domain::services::{PricingContext, RateTable};
use crate::domain::value_objects::{Money, Sku};
use crate::{EcommerceError, Result};

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub display_price: Money,
}

#[derive(Debug, Deserialize)] pub struct CurrencyParams { pub currency: Option<String> }

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory_quantity: Option<u32>,
    pub status: Option<ProductStatus>,
    /// Promo to assign the product to; `null` removes it from any active promo.
    pub promo_id: Option<Uuid>,
}

fn view(s: &AppState, rates: &RateTable, product: Product, currency: &str) -> Result<ProductView> {
    let display_price = PricingContext::new(rates, s.base_currency()).display_price(&product, currency)?;
    Ok(ProductView { product, display_price })
}

fn apply_status(product: &mut Product, status: Option<ProductStatus>) -> Result<()> {
    match status {
        Some(ProductStatus::Active) => product.publish()?,
        Some(ProductStatus::Archived) => product.archive(),
        Some(ProductStatus::Draft) => product.unpublish(),
        None => {}
    }
    Ok(())
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductView>>> {
    let page = Page::new(p.page, p.per_page);
    let currency = s.display_currency(p.currency.as_deref())?;
    let rates = s.rate_table().await?;
    let (products, total) = s.products.list_products(page).await?;
    let data = products.into_iter().map(|product| view(&s, &rates, product, &currency)).collect::<Result<Vec<_>>>()?;
    Ok(Json(PaginatedResponse { data, total, page: page.page }))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<CurrencyParams>) -> Result<Json<ProductView>> {
    let currency = s.display_currency(p.currency.as_deref())?;
    let product = s.products.get_product(id).await?.ok_or(EcommerceError::ProductNotFound)?;
    let rates = s.rate_table().await?;
    Ok(Json(view(&s, &rates, product, &currency)?))
}

pub async fn create_product(State(s): State<AppState>, Json(r): Json<ProductRequest>) -> Result<(StatusCode, Json<ProductView>)> {
    r.validate()?;
    Product::check_price(r.price)?;
    let sku = match &r.sku { Some(sku) => Sku::new(sku.as_str())?, None => Sku::generate() };

    let mut product = Product::create(sku, r.name.trim(), Money::new(r.price, s.base_currency()));
    product.describe(r.description);
    if let Some(qty) = r.inventory_quantity.filter(|q| *q > 0) { product.add_inventory(qty); }
    apply_status(&mut product, r.status)?;
    s.products.insert_product(&product).await?;

    let outcome = s.associator().assign(product.id, r.promo_id).await?;
    let mut events = product.take_events();
    events.extend(outcome.events);
    s.publish(events).await;
    info!(product_id = %product.id, sku = %product.sku, promo = ?outcome.attached_to, "product created");

    let rates = s.rate_table().await?;
    let currency = s.base_currency().to_string();
    Ok((StatusCode::CREATED, Json(view(&s, &rates, product, &currency)?)))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> Result<Json<ProductView>> {
    r.validate()?;
    let mut product = s.products.get_product(id).await?.ok_or(EcommerceError::ProductNotFound)?;
    if let Some(sku) = &r.sku { product.sku = Sku::new(sku.as_str())?; }
    product.rename(r.name.trim())?;
    product.describe(r.description);
    product.update_price(Money::new(r.price, s.base_currency()))?;
    if let Some(qty) = r.inventory_quantity { product.set_inventory(qty); }
    apply_status(&mut product, r.status)?;
    s.products.update_product(&product).await?;

    let outcome = s.associator().assign(product.id, r.promo_id).await?;
    let mut events = product.take_events();
    events.extend(outcome.events);
    s.publish(events).await;
    info!(product_id = %product.id, promo = ?outcome.attached_to, "product updated");

    let rates = s.rate_table().await?;
    let currency = s.base_currency().to_string();
    Ok(Json(view(&s, &rates, product, &currency)?))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let mut product = s.products.get_product(id).await?.ok_or(EcommerceError::ProductNotFound)?;
    product.archive();
    s.products.update_product(&product).await?;
    s.publish(product.take_events()).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{app, create_product, create_promo, decimal, send};
    use axum::http::{Method, StatusCode};
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn promo_products(app: &axum::Router, promo: &str) -> Vec<String> {
        let (_, body) = send(app, Method::GET, &format!("/api/v1/promos/{promo}"), None).await;
        body["product_ids"].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect()
    }

    #[tokio::test]
    async fn test_reassigning_product_moves_it_between_promos() {
        let app = app();
        let a = create_promo(&app, "A", 5).await;
        let b = create_promo(&app, "B", 5).await;
        let product = create_product(&app, dec!(10), 1, Some(&a)).await;
        assert_eq!(promo_products(&app, &a).await, vec![product.clone()]);

        let (status, _) = send(&app, Method::PUT, &format!("/api/v1/products/{product}"), Some(json!({
            "name": "Widget", "price": "10", "promo_id": b,
        }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(promo_products(&app, &a).await.is_empty());
        assert_eq!(promo_products(&app, &b).await, vec![product]);
    }

    #[tokio::test]
    async fn test_unknown_promo_detaches_without_failing_save() {
        let app = app();
        let a = create_promo(&app, "A", 5).await;
        let product = create_product(&app, dec!(10), 1, Some(&a)).await;

        let (status, _) = send(&app, Method::PUT, &format!("/api/v1/products/{product}"), Some(json!({
            "name": "Widget", "price": "10", "promo_id": uuid::Uuid::new_v4(),
        }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(promo_products(&app, &a).await.is_empty());
    }

    #[tokio::test]
    async fn test_display_price_in_requested_currency() {
        let app = app();
        let product = create_product(&app, dec!(10), 1, None).await;

        let (_, body) = send(&app, Method::GET, &format!("/api/v1/products/{product}?currency=NGN"), None).await;
        assert_eq!(decimal(&body["display_price"]["amount"]), dec!(16500));
        assert_eq!(body["display_price"]["currency"], "NGN");

        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/NGN", Some(json!({"rate": "1500", "symbol": "₦"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, &format!("/api/v1/products/{product}?currency=ngn"), None).await;
        assert_eq!(decimal(&body["display_price"]["amount"]), dec!(15000));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let app = app();
        let (status, _) = send(&app, Method::POST, "/api/v1/products", Some(json!({"name": "", "price": "1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::POST, "/api/v1/products", Some(json!({"name": "X", "price": "-1"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);        let (status, _) = send(&app, Method::POST, "/api/v1/products", Some(json!({"name": "X", "price": "1000000000000.01"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_delete_archives_and_hides_from_listing() {
        let app = app();
        let product = create_product(&app, dec!(3), 0, None).await;
        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/products/{product}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, list) = send(&app, Method::GET, "/api/v1/products", None).await;
        assert_eq!(list["total"], 0);
        let (_, body) = send(&app, Method::GET, &format!("/api/v1/products/{product}"), None).await;
        assert_eq!(body["status"], "archived");
    }
}
