//! Order Aggregate
//!
//! Orders snapshot everything pricing-related at checkout: the currency, the
//! exchange rate from the base currency, line prices and any promo discount.
//! Later edits to rates or promos never reach an existing order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub currency: String,
    /// Units of `currency` per unit of base currency at checkout.
    pub exchange_rate: Decimal,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub promo_code: Option<String>,
    pub lines: Vec<OrderLine>,
    pub shipping_address: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLine { pub product_id: Uuid, pub sku: String, pub name: String, pub quantity: u32, pub unit_price: Decimal, pub total: Decimal }

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $text),+ } }
            pub fn parse(value: &str) -> Option<Self> { match value { $($text => Some(Self::$variant),)+ _ => None } }
        }
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus { #[default] Unfulfilled, Fulfilled }
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Voided }

string_enum!(OrderStatus { Pending => "pending", Confirmed => "confirmed", Processing => "processing", Shipped => "shipped", Delivered => "delivered", Cancelled => "cancelled" });
string_enum!(FulfillmentStatus { Unfulfilled => "unfulfilled", Fulfilled => "fulfilled" });
string_enum!(PaymentStatus { Pending => "pending", Paid => "paid", Voided => "voided" });

impl Order {
    /// Creates a pending order from a priced cart.
    pub fn from_cart(cart: &Cart, customer_email: impl Into<String>, exchange_rate: Decimal, shipping_address: serde_json::Value) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let lines = cart.items().iter().map(|i| Ok(OrderLine {
            product_id: i.product_id, sku: i.sku.clone(), name: i.name.clone(), quantity: i.quantity,
            unit_price: i.unit_price.amount(), total: i.line_total().map_err(|_| OrderError::AmountTooLarge)?.amount(),
        })).collect::<Result<Vec<_>, OrderError>>()?;
        let mut order = Self {
            id, order_number: Self::generate_number(), customer_email: customer_email.into(),
            status: OrderStatus::Pending, payment_status: PaymentStatus::Pending, fulfillment_status: FulfillmentStatus::Unfulfilled,
            currency: cart.currency().to_string(), exchange_rate,
            subtotal: cart.subtotal().amount(), discount: cart.discount().amount(), total: cart.total().amount(),
            promo_code: cart.promo().map(|p| p.code.clone()), lines, shipping_address,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: id, customer_email: order.customer_email.clone(), total: order.total, currency: order.currency.clone(),
        }));
        Ok(order)
    }

    fn generate_number() -> String { format!("ORD-{:08}", rand::random::<u32>() % 100_000_000) }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.expect_status(OrderStatus::Pending, "confirm")?;
        self.status = OrderStatus::Confirmed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Confirmed { order_id: self.id, total: self.total }));
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        self.expect_status(OrderStatus::Confirmed, "pay")?;
        self.payment_status = PaymentStatus::Paid;
        self.status = OrderStatus::Processing;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id }));
        Ok(())
    }

    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.expect_status(OrderStatus::Processing, "ship")?;
        self.status = OrderStatus::Shipped;
        self.fulfillment_status = FulfillmentStatus::Fulfilled;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped { order_id: self.id }));
        Ok(())
    }

    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.expect_status(OrderStatus::Shipped, "deliver")?;
        self.status = OrderStatus::Delivered;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered { order_id: self.id }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if matches!(self.status, OrderStatus::Delivered | OrderStatus::Cancelled) { return Err(OrderError::CannotCancel); }
        self.status = OrderStatus::Cancelled;
        if self.payment_status == PaymentStatus::Pending { self.payment_status = PaymentStatus::Voided; }
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    fn expect_status(&self, expected: OrderStatus, action: &'static str) -> Result<(), OrderError> {
        if self.status != expected { return Err(OrderError::InvalidTransition { from: self.status, action }); }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, AmountTooLarge, CannotCancel, InvalidTransition { from: OrderStatus, action: &'static str } }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::AmountTooLarge => write!(f, "Order amount out of range"),
            Self::CannotCancel => write!(f, "Cannot cancel"),
            Self::InvalidTransition { from, action } => write!(f, "Cannot {action} an order that is {}", from.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartItem;
    use crate::domain::value_objects::Money;
    use rust_decimal_macros::dec;

    fn cart() -> Cart {
        let mut cart = Cart::new("s1", "GBP");
        cart.add_item(CartItem { product_id: Uuid::new_v4(), name: "Widget".into(), sku: "W001".into(), quantity: 2, unit_price: Money::new(dec!(7.90), "GBP") }).unwrap();
        cart
    }

    #[test]
    fn test_order_snapshots_cart() {
        let order = Order::from_cart(&cart(), "test@example.com", dec!(0.79), serde_json::json!({})).unwrap();
        assert_eq!(order.currency, "GBP");
        assert_eq!(order.exchange_rate, dec!(0.79));
        assert_eq!(order.subtotal, dec!(15.80));
        assert_eq!(order.lines.len(), 1);
        assert!(order.order_number.starts_with("ORD-"));
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::from_cart(&cart(), "test@example.com", dec!(0.79), serde_json::json!({})).unwrap();
        order.confirm().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        order.mark_paid().unwrap();
        order.ship().unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        order.deliver().unwrap();
        assert_eq!(order.cancel(), Err(OrderError::CannotCancel));
        assert_eq!(order.take_events().len(), 5);
    }

    #[test]
    fn test_out_of_order_transition_rejected() {
        let mut order = Order::from_cart(&cart(), "test@example.com", dec!(1), serde_json::json!({})).unwrap();
        assert!(matches!(order.ship(), Err(OrderError::InvalidTransition { from: OrderStatus::Pending, .. })));
        order.cancel().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Voided);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = Order::from_cart(&Cart::new("s", "USD"), "a@b.co", dec!(1), serde_json::json!({})).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OrderStatus::parse("processing"), Some(OrderStatus::Processing));
        assert_eq!(PaymentStatus::Voided.as_str(), "voided");
        assert_eq!(FulfillmentStatus::parse("nope"), None);
    }
}
