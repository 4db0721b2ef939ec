//! Domain services
pub mod currency_converter;
pub mod pricing;
pub mod promo_associator;

pub use currency_converter::{align_stored_rates, convert, convert_with_fallback, rebase, CurrencyError, RateTable, FALLBACK_RATES};
pub use pricing::PricingContext;
pub use promo_associator::{assign_product, Assignment, AssignmentOutcome, PromoAssociator};
