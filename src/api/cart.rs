//! Session cart handlers. Carts are priced on read in the requested currency.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::{Cart, CartError, CartLine, PromoCode, PromoError};
use crate::domain::services::{PricingContext, RateTable};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize)] pub struct CartParams { pub currency: Option<String>, pub promo: Option<String> }

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: u32,
}

/// A cart priced for one request, with the inputs used to price it.
pub(crate) struct PricedCart { pub cart: Cart, pub promo: Option<PromoCode>, pub rates: RateTable }

pub(crate) async fn priced_cart(s: &AppState, session: &str, currency: &str, promo_code: Option<&str>) -> Result<PricedCart> {
    let mut lines = vec![];
    for line in s.carts.cart_lines(session).await? {
        match s.products.get_product(line.product_id).await? {
            Some(product) if product.is_purchasable() => lines.push((line, product)),
            _ => warn!(%session, product_id = %line.product_id, "skipping unavailable product in cart"),
        }
    }

    let promo = match promo_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(s.promos.find_promo_by_code(code).await?.ok_or_else(|| PromoError::UnknownCode(code.to_string()))?),
        None => None,
    };

    let rates = s.rate_table().await?;
    let cart = PricingContext::new(&rates, s.base_currency()).build_cart(session, currency, &lines, promo.as_ref())?;
    Ok(PricedCart { cart, promo, rates })
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>, Query(p): Query<CartParams>) -> Result<Json<Cart>> {
    let currency = s.display_currency(p.currency.as_deref())?;
    Ok(Json(priced_cart(&s, &session, &currency, p.promo.as_deref()).await?.cart))
}

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> Result<(StatusCode, Json<CartLine>)> {
    r.validate()?;
    let product = s.products.get_product(r.product_id).await?.ok_or(EcommerceError::ProductNotFound)?;
    if !product.is_purchasable() {
        return Err(EcommerceError::Validation(format!("product {} is not available", product.id)));
    }
    let in_cart: u32 = s.carts.cart_lines(&session).await?.iter().filter(|l| l.product_id == product.id).map(|l| l.quantity).sum();
    if in_cart + r.quantity > product.inventory.value() {
        return Err(EcommerceError::InsufficientInventory);
    }
    let line = s.carts.add_cart_line(&session, product.id, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn remove_from_cart(State(s): State<AppState>, Path((session, product_id)): Path<(String, Uuid)>) -> Result<StatusCode> {
    if !s.carts.remove_cart_line(&session, product_id).await? { return Err(CartError::ItemNotFound.into()); }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> Result<StatusCode> {
    s.carts.clear_cart(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
