//! Domain events
use crate::domain::value_objects::Sku;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Promo(PromoEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> String {
        let kind = match self {
            Self::Product(_) => "product",
            Self::Order(_) => "order",
            Self::Promo(_) => "promo",
        };
        format!("ecommerce.{kind}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: Sku },
    Published { product_id: Uuid },
    Archived { product_id: Uuid },
    PriceChanged { product_id: Uuid, price: Decimal },
    InventoryAdded { product_id: Uuid, quantity: u32 },
    InventoryRemoved { product_id: Uuid, quantity: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, customer_email: String, total: Decimal, currency: String },
    Confirmed { order_id: Uuid, total: Decimal },
    Paid { order_id: Uuid },
    Shipped { order_id: Uuid },
    Delivered { order_id: Uuid },
    Cancelled { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromoEvent {
    ProductAttached { promo_id: Uuid, product_id: Uuid },
    ProductDetached { promo_id: Uuid, product_id: Uuid },
    Redeemed { promo_id: Uuid, order_id: Uuid },
}
