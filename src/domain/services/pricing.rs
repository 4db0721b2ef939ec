//! Prices catalog products and carts in the shopper's currency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::aggregates::{Cart, CartItem, CartLine, Product, PromoCode};
use crate::domain::services::currency_converter::{convert_with_fallback, CurrencyError, RateTable};
use crate::domain::value_objects::Money;

/// Everything a price computation needs for one request.
#[derive(Clone, Debug)]
pub struct PricingContext<'a> {
    pub rates: &'a RateTable,
    pub base_currency: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> PricingContext<'a> {
    pub fn new(rates: &'a RateTable, base_currency: &'a str) -> Self {
        Self { rates, base_currency, now: Utc::now() }
    }

    /// Product price in `currency`, rounded for display.
    pub fn display_price(&self, product: &Product, currency: &str) -> Result<Money, CurrencyError> {
        Ok(product.price.convert_to(currency, self.rates)?.rounded())
    }

    /// Units of `currency` per unit of base currency.
    pub fn exchange_rate(&self, currency: &str) -> Result<Decimal, CurrencyError> {
        convert_with_fallback(Decimal::ONE, self.base_currency, currency, self.rates)
    }

    /// Builds a cart in `currency` from stored lines joined with their products,
    /// applying `promo` when given. An unredeemable promo fails the whole call.
    pub fn build_cart(&self, session_id: &str, currency: &str, lines: &[(CartLine, Product)], promo: Option<&PromoCode>) -> crate::Result<Cart> {
        let mut cart = Cart::new(session_id, currency);
        for (line, product) in lines {
            cart.add_item(CartItem {
                product_id: product.id,
                name: product.name.clone(),
                sku: product.sku.to_string(),
                quantity: line.quantity,
                unit_price: self.display_price(product, currency)?,
            })?;
        }
        if let Some(promo) = promo {
            cart.apply_promo(promo, self.now, self.rates, self.base_currency)?;
        }
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Discount;
    use crate::domain::value_objects::Sku;
    use rust_decimal_macros::dec;

    fn product(price: Decimal) -> Product {
        Product::create(Sku::new("P-1").unwrap(), "Widget", Money::usd(price))
    }

    fn line(product: &Product, quantity: u32) -> CartLine {
        CartLine { session_id: "s".into(), product_id: product.id, quantity, created_at: Utc::now() }
    }

    #[test]
    fn test_display_price_rounds_converted_amount() {
        let rates = RateTable::fallback();
        let ctx = PricingContext::new(&rates, "USD");
        let price = ctx.display_price(&product(dec!(19.99)), "GBP").unwrap();
        assert_eq!(price, Money::new(dec!(15.79), "GBP"));
    }

    #[test]
    fn test_exchange_rate_from_base() {
        let rates = RateTable::fallback();
        let ctx = PricingContext::new(&rates, "USD");
        assert_eq!(ctx.exchange_rate("NGN").unwrap(), dec!(1650));
        assert_eq!(ctx.exchange_rate("USD").unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_build_cart_in_foreign_currency_with_promo() {
        let rates = RateTable::fallback();
        let ctx = PricingContext::new(&rates, "USD");
        let widget = product(dec!(10));
        let mut promo = PromoCode::create("W10", Discount::Percentage(dec!(10))).unwrap();
        promo.attach_product(widget.id, None);

        let cart = ctx.build_cart("s", "NGN", &[(line(&widget, 3), widget.clone())], Some(&promo)).unwrap();
        assert_eq!(cart.subtotal().amount(), dec!(49500));
        assert_eq!(cart.discount().amount(), dec!(4950));
        assert_eq!(cart.total(), &Money::new(dec!(44550), "NGN"));
    }
}
