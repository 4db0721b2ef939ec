//! Promo code administration and validation.
//!
//! Products listed on a promo request are routed through the associator, so
//! creating or editing a promo also detaches those products from any other
//! active promo.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::{Discount, PromoCode, PromoError};
use crate::domain::events::DomainEvent;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct PromoRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub discount: Discount,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidatePromoRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub at: Option<DateTime<Utc>>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ValidatePromoResponse { pub valid: bool, pub reason: Option<String>, pub promo: Option<PromoCode> }

impl PromoRequest {
    fn apply_to(&self, promo: &mut PromoCode) -> Result<()> {
        self.discount.validate()?;
        promo.code = PromoCode::normalize(&self.code)?;
        promo.discount = self.discount;
        promo.is_active = self.is_active.unwrap_or(true);
        promo.max_uses = self.max_uses;
        promo.set_window(self.starts_at, self.expires_at)?;
        Ok(())
    }
}

async fn ensure_code_free(s: &AppState, code: &str, own_id: Option<Uuid>) -> Result<()> {
    match s.promos.find_promo_by_code(code).await? {
        Some(existing) if Some(existing.id) != own_id => Err(EcommerceError::Conflict(format!("promo code {} already exists", existing.code))),
        _ => Ok(()),
    }
}

async fn ensure_products_exist(s: &AppState, product_ids: &[Uuid]) -> Result<()> {
    for product_id in product_ids {
        if s.products.get_product(*product_id).await?.is_none() {
            return Err(EcommerceError::Validation(format!("unknown product {product_id}")));
        }
    }
    Ok(())
}

/// Assigns each listed product to `promo_id`, returning the resulting events.
async fn assign_products(s: &AppState, promo_id: Uuid, product_ids: &[Uuid]) -> Result<Vec<DomainEvent>> {
    let associator = s.associator();
    let mut events = vec![];
    for product_id in product_ids {
        events.extend(associator.assign(*product_id, Some(promo_id)).await?.events);
    }
    Ok(events)
}

async fn reload(s: &AppState, id: Uuid) -> Result<PromoCode> {
    s.promos.get_promo(id).await?.ok_or(EcommerceError::PromoNotFound)
}

pub async fn list_promos(State(s): State<AppState>) -> Result<Json<Vec<PromoCode>>> {
    Ok(Json(s.promos.list_promos().await?))
}

pub async fn get_promo(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PromoCode>> {
    Ok(Json(reload(&s, id).await?))
}

pub async fn create_promo(State(s): State<AppState>, Json(r): Json<PromoRequest>) -> Result<(StatusCode, Json<PromoCode>)> {
    r.validate()?;
    let mut promo = PromoCode::create(&r.code, r.discount)?;
    r.apply_to(&mut promo)?;
    ensure_code_free(&s, &promo.code, None).await?;
    ensure_products_exist(&s, &r.product_ids).await?;
    s.promos.insert_promo(&promo).await?;

    let events = assign_products(&s, promo.id, &r.product_ids).await?;
    s.publish(events).await;
    info!(promo_id = %promo.id, code = %promo.code, products = r.product_ids.len(), "promo created");
    Ok((StatusCode::CREATED, Json(reload(&s, promo.id).await?)))
}

pub async fn update_promo(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<PromoRequest>) -> Result<Json<PromoCode>> {
    r.validate()?;
    let mut promo = reload(&s, id).await?;
    r.apply_to(&mut promo)?;
    ensure_code_free(&s, &promo.code, Some(id)).await?;
    ensure_products_exist(&s, &r.product_ids).await?;
    promo.product_ids.retain(|p| r.product_ids.contains(p));
    s.promos.update_promo(&promo).await?;

    let events = assign_products(&s, id, &r.product_ids).await?;
    s.publish(events).await;
    info!(promo_id = %id, code = %promo.code, "promo updated");
    Ok(Json(reload(&s, id).await?))
}

pub async fn delete_promo(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    if !s.promos.delete_promo(id).await? { return Err(EcommerceError::PromoNotFound); }
    info!(promo_id = %id, "promo deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_promo(State(s): State<AppState>, Json(r): Json<ValidatePromoRequest>) -> Result<Json<ValidatePromoResponse>> {
    r.validate()?;
    let Some(promo) = s.promos.find_promo_by_code(&r.code).await? else {
        let reason = PromoError::UnknownCode(r.code.trim().to_string()).to_string();
        return Ok(Json(ValidatePromoResponse { valid: false, reason: Some(reason), promo: None }));
    };
    let mut reason = promo.check_redeemable(r.at.unwrap_or_else(Utc::now)).err().map(|e| e.to_string());
    if reason.is_none() {
        if let Some(product_id) = r.product_id.filter(|p| !promo.applies_to(*p)) {
            reason = Some(format!("Promo code {} does not apply to product {product_id}", promo.code));
        }
    }
    Ok(Json(ValidatePromoResponse { valid: reason.is_none(), reason, promo: Some(promo) }))
}
