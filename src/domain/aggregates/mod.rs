//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod promo;
pub mod currency;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{Order, OrderError, OrderLine, OrderStatus, PaymentStatus, FulfillmentStatus};
pub use cart::{AppliedPromo, Cart, CartError, CartItem, CartLine};
pub use promo::{Discount, PromoCode, PromoError};
pub use currency::CurrencyRate;
