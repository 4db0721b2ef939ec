//! Currency rate administration and the conversion endpoint.

use axum::{extract::{Path, Query, State}, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::CurrencyRate;
use crate::domain::services::currency_converter::{convert_with_fallback, normalize_code};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct CurrencyRequest {
    pub rate: Decimal,
    #[validate(length(min = 1, max = 8))]
    pub symbol: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)] pub struct ConvertParams { pub amount: Decimal, pub from: String, pub to: String }
#[derive(Debug, Serialize)] pub struct ConvertResponse { pub amount: Decimal, pub from: String, pub to: String, pub converted: Decimal }

pub async fn list_currencies(State(s): State<AppState>) -> Result<Json<Vec<CurrencyRate>>> {
    Ok(Json(s.currencies.list_currencies().await?))
}

pub async fn upsert_currency(State(s): State<AppState>, Path(code): Path<String>, Json(r): Json<CurrencyRequest>) -> Result<Json<CurrencyRate>> {
    r.validate()?;
    let mut currency = CurrencyRate::new(&code, r.rate, r.symbol)?;
    currency.is_active = r.is_active.unwrap_or(true);
    currency.check_against_base(s.base_currency())?;
    s.currencies.upsert_currency(&currency).await?;
    info!(code = %currency.code, rate = %currency.rate, active = currency.is_active, "currency rate saved");
    Ok(Json(currency))
}

pub async fn convert(State(s): State<AppState>, Query(p): Query<ConvertParams>) -> Result<Json<ConvertResponse>> {
    let from = normalize_code(&p.from)?;
    let to = normalize_code(&p.to)?;
    let rates = s.rate_table().await?;
    let converted = convert_with_fallback(p.amount, &from, &to, &rates)?.normalize();
    Ok(Json(ConvertResponse { amount: p.amount, from, to, converted }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{app, decimal, send};
    use super::super::{router, AppState};
    use crate::config::Config;
    use crate::domain::aggregates::CurrencyRate;
    use crate::domain::repositories::CurrencyRepository;
    use crate::domain::services::align_stored_rates;
    use crate::infrastructure::InMemoryStore;
    use axum::http::{Method, StatusCode};
    use std::sync::Arc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_convert_with_fallback_table() {
        let (status, body) = send(&app(), Method::GET, "/api/v1/currencies/convert?amount=1650&from=NGN&to=usd", None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(decimal(&body["converted"]), dec!(1));
        assert_eq!(body["to"], "USD");
    }

    #[tokio::test]
    async fn test_convert_unknown_currency() {
        let (status, _) = send(&app(), Method::GET, "/api/v1/currencies/convert?amount=1&from=USD&to=JPY", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app(), Method::GET, "/api/v1/currencies/convert?amount=1&from=USD&to=YEN1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upsert_and_list() {
        let app = app();
        let (status, body) = send(&app, Method::PUT, "/api/v1/currencies/eur", Some(json!({"rate": "0.92", "symbol": "€"}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["code"], "EUR");

        let (_, body) = send(&app, Method::GET, "/api/v1/currencies/convert?amount=92&from=EUR&to=USD", None).await;
        assert_eq!(decimal(&body["converted"]), dec!(100));

        let (_, list) = send(&app, Method::GET, "/api/v1/currencies", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_rates_follow_configured_base() {
        let store = Arc::new(InMemoryStore::new());
        for (code, rate, symbol) in [("USD", dec!(1), "$"), ("GBP", dec!(0.79), "£"), ("NGN", dec!(1650), "₦")] {
            store.upsert_currency(&CurrencyRate::new(code, rate, symbol).unwrap()).await.unwrap();
        }
        let config = Config { base_currency: "NGN".into(), ..Config::for_tests() };
        assert!(align_stored_rates(&*store, &config.base_currency).await.unwrap());
        let app = router(AppState::with_store(store, config, None));

        let (_, body) = send(&app, Method::GET, "/api/v1/currencies/convert?amount=1650&from=NGN&to=USD", None).await;
        assert_eq!(decimal(&body["converted"]).round_dp(2), dec!(1));

        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/NGN", Some(json!({"rate": "1650", "symbol": "₦"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/NGN", Some(json!({"rate": "1", "symbol": "₦"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/api/v1/currencies/convert?amount=1650&from=NGN&to=USD", None).await;
        assert_eq!(decimal(&body["converted"]).round_dp(2), dec!(1));
    }

    #[tokio::test]
    async fn test_rejects_bad_rates() {
        let app = app();
        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/GBP", Some(json!({"rate": "0", "symbol": "£"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/USD", Some(json!({"rate": "2", "symbol": "$"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = send(&app, Method::PUT, "/api/v1/currencies/USD", Some(json!({"rate": "1", "symbol": "$", "is_active": false}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
