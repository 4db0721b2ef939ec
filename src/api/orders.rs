//! Checkout and order handlers.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::cart::priced_cart;
use super::{AppState, ListParams, PaginatedResponse};
use crate::domain::aggregates::Order;
use crate::domain::events::{DomainEvent, PromoEvent};
use crate::domain::repositories::Page;
use crate::domain::services::PricingContext;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
    #[validate(email)]
    pub customer_email: String,
    pub currency: Option<String>,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
}

pub async fn checkout(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<Order>)> {
    r.validate()?;
    let currency = s.display_currency(r.currency.as_deref())?;
    let priced = priced_cart(&s, &r.session_id, &currency, r.promo_code.as_deref()).await?;
    if priced.cart.is_empty() { return Err(EcommerceError::EmptyCart); }

    // Check every line before touching stock.
    let mut reserved = Vec::with_capacity(priced.cart.item_count());
    for item in priced.cart.items() {
        let mut product = s.products.get_product(item.product_id).await?.ok_or(EcommerceError::ProductNotFound)?;
        product.remove_inventory(item.quantity).map_err(|_| EcommerceError::InsufficientInventory)?;
        reserved.push(product);
    }

    let exchange_rate = PricingContext::new(&priced.rates, s.base_currency()).exchange_rate(&currency)?;
    let mut order = Order::from_cart(&priced.cart, r.customer_email.trim(), exchange_rate, r.shipping_address)?;

    let mut events: Vec<DomainEvent> = vec![];
    for mut product in reserved {
        s.products.update_product(&product).await?;
        events.extend(product.take_events());
    }
    s.orders.insert_order(&order).await?;

    if let Some(promo) = priced.promo {
        s.promos.record_promo_use(promo.id).await?;
        events.push(DomainEvent::Promo(PromoEvent::Redeemed { promo_id: promo.id, order_id: order.id }));
    }
    s.carts.clear_cart(&r.session_id).await?;

    events.extend(order.take_events());
    s.publish(events).await;
    info!(order_id = %order.id, order_number = %order.order_number, total = %order.total, currency = %order.currency, "order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>> {
    let page = Page::new(p.page, p.per_page);
    let (data, total) = s.orders.list_orders(page).await?;
    Ok(Json(PaginatedResponse { data, total, page: page.page }))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    s.orders.get_order(id).await?.map(Json).ok_or(EcommerceError::OrderNotFound)
}

pub async fn transition_order(State(s): State<AppState>, Path((id, action)): Path<(Uuid, String)>) -> Result<Json<Order>> {
    let mut order = s.orders.get_order(id).await?.ok_or(EcommerceError::OrderNotFound)?;
    match action.as_str() {
        "confirm" => order.confirm()?,
        "pay" => order.mark_paid()?,
        "ship" => order.ship()?,
        "deliver" => order.deliver()?,
        "cancel" => order.cancel()?,
        other => return Err(EcommerceError::Validation(format!("unknown order action {other}"))),
    }
    s.orders.update_order(&order).await?;
    s.publish(order.take_events()).await;
    info!(order_id = %order.id, status = order.status.as_str(), "order status changed");
    Ok(Json(order))
}
