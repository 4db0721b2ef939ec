//! HTTP surface (axum). Handlers live per resource; shared state, error
//! mapping and event publishing are here.

mod cart;
mod catalog;
mod currencies;
mod orders;
mod promos;

use axum::{http::StatusCode, response::{IntoResponse, Response}, routing::{delete, get, post, put}, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::config::Config;
use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::events::DomainEvent;
use crate::domain::repositories::{CartRepository, CurrencyRepository, OrderRepository, ProductRepository, PromoRepository};
use crate::domain::services::currency_converter::{normalize_code, CurrencyError, RateTable};
use crate::domain::services::PromoAssociator;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub products: Arc<dyn ProductRepository>,
    pub promos: Arc<dyn PromoRepository>,
    pub currencies: Arc<dyn CurrencyRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    /// State backed by a single store implementing every repository.
    pub fn with_store<S>(store: Arc<S>, config: Config, nats: Option<async_nats::Client>) -> Self
    where
        S: ProductRepository + PromoRepository + CurrencyRepository + CartRepository + OrderRepository + 'static,
    {
        Self {
            config: Arc::new(config),
            products: store.clone(),
            promos: store.clone(),
            currencies: store.clone(),
            carts: store.clone(),
            orders: store,
            nats,
        }
    }

    pub fn base_currency(&self) -> &str { &self.config.base_currency }

    pub fn associator(&self) -> PromoAssociator { PromoAssociator::new(self.promos.clone()) }

    /// Live rate table built from the active stored currencies. The base
    /// currency is always present at rate 1.
    pub async fn rate_table(&self) -> Result<RateTable> {
        let currencies = self.currencies.list_currencies().await?;
        let mut rates = RateTable::from_currencies(&currencies);
        if !rates.is_empty() && !rates.contains(self.base_currency()) {
            rates.insert(self.base_currency(), Decimal::ONE);
        }
        Ok(rates)
    }

    /// Requested display currency, defaulting to the base currency.
    pub fn display_currency(&self, requested: Option<&str>) -> Result<String> {
        match requested.filter(|c| !c.trim().is_empty()) {
            Some(code) => Ok(normalize_code(code)?),
            None => Ok(self.config.base_currency.clone()),
        }
    }

    /// Publishes events to NATS when configured. Failures are logged, never returned.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(nats) = &self.nats else { return };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => { warn!(error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = nats.publish(event.subject(), payload.into()).await {
                warn!(error = %e, subject = %event.subject(), "failed to publish event");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-storefront"})) }))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/:id", get(catalog::get_product).put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/v1/currencies", get(currencies::list_currencies))
        .route("/api/v1/currencies/convert", get(currencies::convert))
        .route("/api/v1/currencies/:code", put(currencies::upsert_currency))
        .route("/api/v1/promos", get(promos::list_promos).post(promos::create_promo))
        .route("/api/v1/promos/validate", post(promos::validate_promo))
        .route("/api/v1/promos/:id", get(promos::get_promo).put(promos::update_promo).delete(promos::delete_promo))
        .route("/api/v1/cart/:session", get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/:session/items/:product_id", delete(cart::remove_from_cart))
        .route("/api/v1/checkout", post(orders::checkout))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/:action", post(orders::transition_order))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub currency: Option<String> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProductNotFound | Self::PromoNotFound | Self::OrderNotFound | Self::Cart(CartError::ItemNotFound) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Sku(_) | Self::Currency(CurrencyError::InvalidCode(_)) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::Order(OrderError::CannotCancel | OrderError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            Self::StorageError(e) => {
                error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    pub(super) fn app() -> Router {
        router(AppState::with_store(Arc::new(InMemoryStore::new()), Config::for_tests(), None))
    }

    pub(super) async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.map(|b| b.to_string()).unwrap_or_default()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub(super) fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => s.parse().unwrap(),
            other => other.to_string().parse().unwrap(),
        }
    }

    pub(super) async fn create_product(app: &Router, price: Decimal, inventory: u32, promo_id: Option<&str>) -> String {
        let (status, body) = send(app, Method::POST, "/api/v1/products", Some(json!({
            "name": "Widget",
            "price": price.to_string(),
            "inventory_quantity": inventory,
            "status": "active",
            "promo_id": promo_id,
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    pub(super) async fn create_promo(app: &Router, code: &str, percent: u32) -> String {
        let (status, body) = send(app, Method::POST, "/api/v1/promos", Some(json!({
            "code": code,
            "discount": {"type": "percentage", "value": percent},
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        assert_eq!(EcommerceError::PromoNotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(EcommerceError::Validation("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(EcommerceError::EmptyCart.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(EcommerceError::StorageError("down".into()).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_checkout_flow_in_foreign_currency() {
        let app = app();
        let promo = create_promo(&app, "save10", 10).await;
        let product = create_product(&app, dec!(20), 5, Some(&promo)).await;

        let (status, _) = send(&app, Method::POST, "/api/v1/cart/s1", Some(json!({"product_id": product, "quantity": 2}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, cart) = send(&app, Method::GET, "/api/v1/cart/s1?currency=gbp&promo=SAVE10", None).await;
        assert_eq!(status, StatusCode::OK, "{cart}");
        assert_eq!(decimal(&cart["subtotal"]["amount"]), dec!(31.60));
        assert_eq!(decimal(&cart["discount"]["amount"]), dec!(3.16));
        assert_eq!(decimal(&cart["total"]["amount"]), dec!(28.44));

        let (status, order) = send(&app, Method::POST, "/api/v1/checkout", Some(json!({
            "session_id": "s1",
            "customer_email": "buyer@example.com",
            "currency": "GBP",
            "promo_code": "save10",
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        assert_eq!(order["currency"], "GBP");
        assert_eq!(order["promo_code"], "SAVE10");
        assert_eq!(decimal(&order["exchange_rate"]), dec!(0.79));
        assert_eq!(decimal(&order["total"]), dec!(28.44));

        let (_, cart) = send(&app, Method::GET, "/api/v1/cart/s1", None).await;
        assert_eq!(cart["items"].as_array().unwrap().len(), 0);

        let (_, product) = send(&app, Method::GET, &format!("/api/v1/products/{product}"), None).await;
        assert_eq!(product["inventory"], 3);

        let (_, promo) = send(&app, Method::GET, &format!("/api/v1/promos/{promo}"), None).await;
        assert_eq!(promo["times_used"], 1);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_rejected() {
        let (status, _) = send(&app(), Method::POST, "/api/v1/checkout", Some(json!({
            "session_id": "nobody",
            "customer_email": "buyer@example.com",
        }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_checkout_requires_valid_email() {
        let (status, _) = send(&app(), Method::POST, "/api/v1/checkout", Some(json!({
            "session_id": "s1",
            "customer_email": "not-an-email",
        }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
